//! Settings command implementation.

use super::open_existing;
use crate::error::{CliError, CliResult};
use clap::Subcommand;
use serde_json::Value;
use std::path::Path;
use wakekit_core::{Config, SettingsFile};

/// Settings operations.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print all values as JSON
    Show,

    /// Print one value
    Get {
        /// Setting key
        key: String,
    },

    /// Set one value; a value that is not JSON is stored as a string
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },

    /// Merge the members of a JSON object into the values
    Update {
        /// JSON object
        json: String,
    },

    /// Replace all values with a JSON object
    Replace {
        /// JSON object
        json: String,
    },

    /// Print the fingerprint of the values
    Hash,
}

/// Runs a settings action.
pub fn run(path: &Path, action: &SettingsAction) -> CliResult<()> {
    let ctx = open_existing(path, Config::default())?;
    if let Some(output) = apply(ctx.settings(), action)? {
        println!("{output}");
    }
    Ok(())
}

/// Applies `action`, returning what should be printed.
fn apply(settings: &SettingsFile, action: &SettingsAction) -> CliResult<Option<String>> {
    match action {
        SettingsAction::Show => Ok(Some(settings.values_json())),
        SettingsAction::Get { key } => match settings.get_value::<Value>(key) {
            Some(value) => Ok(Some(serde_json::to_string(&value)?)),
            None => Err(CliError::Rejected(format!("no setting named '{key}'"))),
        },
        SettingsAction::Set { key, value } => {
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
            if !settings.set_value(key, value) {
                return Err(CliError::Rejected(format!("failed to save '{key}'")));
            }
            Ok(None)
        }
        SettingsAction::Update { json } => {
            if !settings.update_values_json(json) {
                return Err(CliError::Rejected("expected a JSON object".to_string()));
            }
            Ok(None)
        }
        SettingsAction::Replace { json } => {
            if !settings.set_values_json(json) {
                return Err(CliError::Rejected("expected a JSON object".to_string()));
            }
            Ok(None)
        }
        SettingsAction::Hash => Ok(Some(format!("{:08x}", settings.hash()))),
    }
}
