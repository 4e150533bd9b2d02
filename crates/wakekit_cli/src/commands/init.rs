//! Init command implementation.

use crate::error::{CliError, CliResult};
use std::path::Path;
use wakekit_core::{Config, WakeContext};

/// Creates a data directory with a fresh wake record.
pub fn run(path: &Path) -> CliResult<()> {
    let ctx = WakeContext::open(path, Config::default())?;
    if !ctx.record().store().save() || !ctx.settings().save() {
        return Err(CliError::Rejected(format!(
            "could not write to {}",
            path.display()
        )));
    }
    println!("Initialized data directory at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_record_and_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device");
        run(&path).unwrap();

        assert_eq!(std::fs::metadata(path.join("wake.dat")).unwrap().len(), 48);
        assert_eq!(std::fs::read_to_string(path.join("settings.json")).unwrap(), "{}");
    }
}
