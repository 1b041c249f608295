//! Command implementations for sharelock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command resolves the configuration for its shared
//! folder first, so a bad `.sharelock.yaml` fails the same way everywhere.

mod force_break;
mod hold;
mod probe;
mod status;

use crate::cli::{Cli, Command};
use sharelock::error::{LockError, Result};
use sharelock::LockConfig;
use std::path::Path;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Status(args) => status::cmd_status(&args.dir, config_path),
        Command::Probe(args) => probe::cmd_probe(&args.dir, config_path),
        Command::Hold(args) => hold::cmd_hold(args, config_path),
        Command::Break(args) => force_break::cmd_break(args, config_path),
    }
}

/// Resolve the configuration for `dir`, rejecting folders that do not exist.
fn load_config(dir: &Path, config_path: Option<&Path>) -> Result<LockConfig> {
    if !dir.is_dir() {
        return Err(LockError::UserError(format!(
            "shared folder '{}' does not exist or is not a directory",
            dir.display()
        )));
    }
    LockConfig::resolve(dir, config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharelock::exit_codes;
    use tempfile::TempDir;

    #[test]
    fn missing_folder_is_a_user_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("unmounted");

        let err = load_config(&missing, None).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn folder_config_file_is_picked_up() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".sharelock.yaml"),
            "lock_file_name: datastore.lock\n",
        )
        .unwrap();

        let config = load_config(temp.path(), None).unwrap();
        assert_eq!(config.lock_file_name, "datastore.lock");
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");

        let err = load_config(temp.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, LockError::Config(_)));
    }
}
