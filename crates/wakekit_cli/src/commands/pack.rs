//! Pack command implementation.

use super::open_existing;
use crate::error::{CliError, CliResult};
use serde_json::Value;
use std::path::Path;
use wakekit_core::json::splice_value;
use wakekit_core::{Config, WakeContext, WakeEventKind};

/// Priority given to fields passed with `--field`.
const FIELD_PRIORITY: i32 = 60;

/// Inputs for one packing run.
#[derive(Debug, Default)]
pub struct PackOptions {
    /// Payload size budget; the configured default when `None`.
    pub max_size: Option<usize>,
    /// Value for the wake reason event.
    pub wake_reason: Option<i64>,
    /// Value for the reset reason event.
    pub reset_reason: Option<String>,
    /// Value for the time-to-connect event, in milliseconds.
    pub time_to_connect: Option<u64>,
    /// Extra `key=json` fields.
    pub fields: Vec<String>,
}

/// Runs the pack command.
///
/// Event history included in the printed payloads is removed from the
/// backlog.
pub fn run(path: &Path, options: &PackOptions) -> CliResult<()> {
    let ctx = open_existing(path, Config::default())?;
    let payloads = pack(&ctx, options)?;

    for payload in &payloads {
        println!("{payload}");
    }
    tracing::info!(count = payloads.len(), "payloads generated");
    Ok(())
}

/// Registers the requested fields and wake events, then packs.
pub fn pack(ctx: &WakeContext, options: &PackOptions) -> CliResult<Vec<String>> {
    {
        let mut packer = ctx.packer();
        for field in &options.fields {
            let (key, value) = parse_field(field)?;
            packer.add_one_shot(move |writer, priority| {
                writer.name(&key);
                splice_value(&value, writer);
                *priority = FIELD_PRIORITY;
            });
        }
    }

    if let Some(reason) = options.wake_reason {
        ctx.add_wake_event(WakeEventKind::WakeReason, reason);
    }
    if let Some(reason) = &options.reset_reason {
        ctx.add_wake_event(WakeEventKind::ResetReason, reason);
    }
    if let Some(millis) = options.time_to_connect {
        ctx.add_wake_event(WakeEventKind::TimeToConnect, millis);
    }

    Ok(match options.max_size {
        Some(size) => ctx.build_payloads_with(size),
        None => ctx.build_payloads(),
    })
}

/// Splits `key=value`. A value that is not JSON is taken as a string.
fn parse_field(field: &str) -> CliResult<(String, Value)> {
    let (key, raw) = field
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| CliError::Rejected(format!("field '{field}' is not key=value")))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
