//! Sharelock: crash-safe exclusive access lock for file-based datastores on
//! shared network folders.
//!
//! Several desktop clients open the same datastore through an SMB or NFS
//! share. `LockClient` arbitrates single-writer access with an OS-level
//! exclusive lock on a coordination file next to the datastore; the file's
//! JSON content only describes the holder.
//!
//! ```no_run
//! use sharelock::{AcquireTimeout, LockClient, LockConfig, Owner};
//! use std::time::Duration;
//!
//! # fn main() -> sharelock::Result<()> {
//! let client = LockClient::new("/mnt/share/datastore", LockConfig::default())?;
//! let mut handle = client.acquire(
//!     AcquireTimeout::Within(Duration::from_secs(10)),
//!     &Owner::current(),
//! )?;
//! // ... exclusive datastore session ...
//! handle.release();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod locks;

pub use config::LockConfig;
pub use error::{LockError, Result};
pub use locks::{
    AcquireTimeout, BreakConfirmation, CancelToken, ForceBreakOutcome, HandleState, LockClient,
    LockHandle, LockInfo, LockLost, LockRecord, Owner,
};
