//! Implementation of the `sharelock probe` command.

use super::load_config;
use sharelock::error::Result;
use sharelock::LockClient;
use std::path::Path;

/// Execute the `sharelock probe` command.
///
/// Constructing the client runs the capability probe; an unsupported
/// filesystem surfaces as `LockError::Unavailable`.
pub fn cmd_probe(dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(dir, config_path)?;
    let client = LockClient::new(dir, config)?;
    client.ensure_supported()?;

    println!(
        "Exclusive file locks are supported in '{}'.",
        dir.display()
    );
    Ok(())
}
