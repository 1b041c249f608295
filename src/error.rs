//! Error types for sharelock.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use crate::locks::LockRecord;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lock operations.
///
/// Each variant maps to a specific CLI exit code.
#[derive(Error, Debug)]
pub enum LockError {
    /// A live holder owns the lock and it could not be acquired within the timeout.
    #[error("{}", busy_message(.holder.as_ref()))]
    Busy {
        /// The lock file that was contended.
        path: PathBuf,
        /// Best-effort description of the current holder.
        holder: Option<LockRecord>,
    },

    /// The filesystem holding the lock file does not honor exclusive locks.
    #[error(
        "exclusive file locking is not supported at '{}': {reason}. \
         Move the datastore to a local disk or a share that supports file locks",
        .path.display()
    )]
    Unavailable { path: PathBuf, reason: String },

    /// A held lock was lost after acquisition.
    #[error("Lock lost: {0}")]
    Lost(String),

    /// The lock record could not be decoded.
    #[error("lock record '{}' is unreadable: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Force-break preconditions were not met.
    #[error("refusing to break lock '{}': {reason}", .path.display())]
    BreakRefused { path: PathBuf, reason: String },

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// User provided invalid input.
    #[error("{0}")]
    UserError(String),

    /// Filesystem failure outside of the cases above.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Wrap an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LockError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Busy { .. } => exit_codes::LOCK_BUSY,
            LockError::Unavailable { .. } => exit_codes::LOCK_UNAVAILABLE,
            LockError::Lost(_) => exit_codes::LOCK_LOST,
            LockError::Corrupt { .. } => exit_codes::IO_FAILURE,
            LockError::BreakRefused { .. } => exit_codes::USER_ERROR,
            LockError::Config(_) => exit_codes::USER_ERROR,
            LockError::UserError(_) => exit_codes::USER_ERROR,
            LockError::Io { .. } => exit_codes::IO_FAILURE,
        }
    }
}

fn busy_message(holder: Option<&LockRecord>) -> String {
    match holder {
        Some(record) => format!(
            "Database is in use by {} on {} since {}",
            record.owner.user,
            record.owner.host,
            record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "Database is in use by another process (holder unknown)".to_string(),
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
