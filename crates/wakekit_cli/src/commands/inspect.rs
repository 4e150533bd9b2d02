//! Inspect command implementation.

use super::open_existing;
use crate::error::CliResult;
use serde::Serialize;
use std::path::Path;
use wakekit_core::record::{RecordHeader, HEADER_SIZE, WAKE_RECORD_MAGIC, WAKE_RECORD_VERSION};
use wakekit_core::{Config, WakeContext};
use wakekit_storage::{FileBackend, StorageBackend};

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Wake bookkeeping record.
    pub record: RecordStats,
    /// Event backlog.
    pub events: EventStats,
    /// Settings file.
    pub settings: SettingsStats,
}

/// State of the wake bookkeeping record.
#[derive(Debug, Serialize)]
pub struct RecordStats {
    /// Size of the saved record in bytes.
    pub file_size: u64,
    /// Header as saved, if at least a header is on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_header: Option<HeaderStats>,
    /// Whether the saved magic and version match this build.
    pub valid: bool,
    /// When the cloud was last asked for updates.
    pub last_update_check: i64,
    /// When the cloud should next be asked for updates.
    pub next_update_check: i64,
    /// Last wake with a connection.
    pub last_full_wake: i64,
    /// Last wake without a connection.
    pub last_quick_wake: i64,
}

/// Decoded record header.
#[derive(Debug, Serialize)]
pub struct HeaderStats {
    /// Magic number.
    pub magic: String,
    /// Layout version.
    pub version: u16,
    /// Record size.
    pub size: u16,
}

/// State of the event backlog.
#[derive(Debug, Serialize)]
pub struct EventStats {
    /// Log file size in bytes.
    pub file_size: u64,
    /// Complete, readable entries.
    pub entries: usize,
    /// Lines that would be skipped on delivery.
    pub unreadable: usize,
}

/// State of the settings file.
#[derive(Debug, Serialize)]
pub struct SettingsStats {
    /// Number of keys.
    pub keys: usize,
    /// MurmurHash3 fingerprint of the values.
    pub hash: String,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_settings: bool, format: &str) -> CliResult<()> {
    let ctx = open_existing(path, Config::default())?;
    let result = inspect(&ctx)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
            if show_settings {
                println!();
                println!("Values:");
                println!("  {}", ctx.settings().values_json());
            }
        }
    }

    Ok(())
}

/// Gathers statistics from an open context.
pub fn inspect(ctx: &WakeContext) -> CliResult<InspectResult> {
    let backend = FileBackend::new(&ctx.path().join("wake.dat"));
    let file_size = backend.size()?;
    let mut buf = [0u8; HEADER_SIZE];
    let n = backend.read_into(&mut buf)?;
    let saved = RecordHeader::read(&buf[..n]);

    let record = ctx.record();
    let record = RecordStats {
        file_size,
        valid: saved.is_some_and(|h| h.magic == WAKE_RECORD_MAGIC && h.version == WAKE_RECORD_VERSION),
        saved_header: saved.map(|h| HeaderStats {
            magic: format!("{:#010x}", h.magic),
            version: h.version,
            size: h.size,
        }),
        last_update_check: record.last_update_check(),
        next_update_check: record.next_update_check(),
        last_full_wake: record.last_full_wake(),
        last_quick_wake: record.last_quick_wake(),
    };

    let log = ctx.event_log();
    let (entries, unreadable) = count_entries(log.path());
    let events = EventStats {
        file_size: log.size(),
        entries,
        unreadable,
    };

    let settings = ctx.settings();
    let keys = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&settings.values_json())
        .map(|map| map.len())
        .unwrap_or(0);
    let settings = SettingsStats {
        keys,
        hash: format!("{:08x}", settings.hash()),
    };

    Ok(InspectResult {
        path: ctx.path().display().to_string(),
        record,
        events,
        settings,
    })
}

fn count_entries(path: &Path) -> (usize, usize) {
    let Ok(text) = std::fs::read_to_string(path) else {
        return (0, 0);
    };

    let mut entries = 0;
    let mut unreadable = 0;
    // Only newline-terminated lines are complete
    for line in text.split_inclusive('\n').filter(|l| l.ends_with('\n')) {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) if value.is_object() => entries += 1,
            _ => unreadable += 1,
        }
    }
    (entries, unreadable)
}

fn print_text_output(result: &InspectResult) {
    println!("WakeKit Data Directory Inspection");
    println!("=================================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Wake record:");
    println!("  File size:         {}", format_size(result.record.file_size));
    match &result.record.saved_header {
        Some(header) => println!(
            "  Saved header:      magic {} version {} size {}",
            header.magic, header.version, header.size
        ),
        None => println!("  Saved header:      none"),
    }
    println!("  Valid:             {}", result.record.valid);
    println!("  Last update check: {}", result.record.last_update_check);
    println!("  Next update check: {}", result.record.next_update_check);
    println!("  Last full wake:    {}", result.record.last_full_wake);
    println!("  Last quick wake:   {}", result.record.last_quick_wake);
    println!();
    println!("Event backlog:");
    println!("  File size:  {}", format_size(result.events.file_size));
    println!("  Entries:    {}", result.events.entries);
    println!("  Unreadable: {}", result.events.unreadable);
    println!();
    println!("Settings:");
    println!("  Keys: {}", result.settings.keys);
    println!("  Hash: {}", result.settings.hash);
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counts_complete_entries_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "{\"a\":1}\nbroken\n{\"b\":2}\n{\"c\":").unwrap();
        assert_eq!(count_entries(&path), (2, 1));
    }

    #[test]
    fn inspect_fresh_directory() {
        let dir = tempdir().unwrap();
        let ctx = WakeContext::open(dir.path(), Config::default()).unwrap();
        ctx.event_log().add_event(r#"{"x":1}"#);
        ctx.settings().set_value("k", "v");

        let result = inspect(&ctx).unwrap();
        assert_eq!(result.record.file_size, 0);
        assert!(!result.record.valid);
        assert_eq!(result.events.entries, 1);
        assert_eq!(result.settings.keys, 1);
    }

    #[test]
    fn inspect_saved_record() {
        let dir = tempdir().unwrap();
        let ctx = WakeContext::open(dir.path(), Config::default()).unwrap();
        ctx.mark_full_wake(1_700_000_000);
        ctx.prepare_to_sleep(false);

        let result = inspect(&ctx).unwrap();
        assert!(result.record.valid);
        assert_eq!(result.record.file_size, 48);
        assert_eq!(result.record.last_full_wake, 1_700_000_000);
    }
}
