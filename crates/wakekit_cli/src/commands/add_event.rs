//! Add-event command implementation.

use super::open_existing;
use crate::error::{CliError, CliResult};
use serde_json::{Map, Value};
use std::path::Path;
use wakekit_core::Config;

/// Runs the add-event command.
///
/// `json` must be a single JSON object. It is re-serialized compactly, so
/// the event size limit applies to the stored form.
pub fn run(path: &Path, json: &str, max_event_size: Option<usize>) -> CliResult<()> {
    let members: Map<String, Value> = serde_json::from_str(json)
        .map_err(|err| CliError::Rejected(format!("event is not a JSON object: {err}")))?;

    let mut config = Config::default();
    if let Some(size) = max_event_size {
        config = config.max_event_size(size);
    }
    let ctx = open_existing(path, config)?;

    let added = ctx.event_log().add_event_with(|writer| {
        for (key, value) in &members {
            writer.key_value(key, value);
        }
    });
    if !added {
        return Err(CliError::Rejected(format!(
            "event refused: larger than {} bytes",
            ctx.config().max_event_size
        )));
    }

    println!("Backlog now {} bytes", ctx.event_log().size());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_object() {
        let dir = tempdir().unwrap();
        run(dir.path(), r#"{"temp": 21.5}"#, None).unwrap();

        let text = std::fs::read_to_string(dir.path().join("events.log")).unwrap();
        assert_eq!(text, "{\"temp\":21.5}\n");
    }

    #[test]
    fn rejects_non_object() {
        let dir = tempdir().unwrap();
        let err = run(dir.path(), "[1,2]", None).unwrap_err();
        assert!(matches!(err, CliError::Rejected(_)));
    }

    #[test]
    fn rejects_oversized() {
        let dir = tempdir().unwrap();
        let err = run(dir.path(), r#"{"long":"0123456789"}"#, Some(8)).unwrap_err();
        assert!(matches!(err, CliError::Rejected(_)));
    }

    #[test]
    fn missing_directory() {
        let dir = tempdir().unwrap();
        let err = run(&dir.path().join("nope"), "{}", None).unwrap_err();
        assert!(matches!(err, CliError::NotFound(_)));
    }
}
