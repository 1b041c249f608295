//! Configuration model for sharelock.
//!
//! This module defines the `LockConfig` struct that represents an optional
//! `.sharelock.yaml` next to the datastore. It supports forward-compatible YAML
//! parsing (unknown fields are ignored), sensible defaults for every field,
//! environment overrides, and validation of the timing relationships the lock
//! protocol depends on.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::LockConfig;
pub use types::CONFIG_FILE_NAME;
