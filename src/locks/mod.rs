//! Exclusive access lock for a datastore on a shared folder.
//!
//! Several desktop clients on different machines open the same datastore
//! through a network share. This module arbitrates single-writer access
//! without a coordinator:
//!
//! # Lock File
//!
//! A single lock file (`<shared-folder>/.lock` by default) is the only
//! coordination artifact. Ownership is the **OS-level exclusive lock** on
//! that file (`flock` / `LockFileEx`), never the file's existence. Because
//! the OS drops the lock when the holding process dies, a crashed holder is
//! reclaimed by the next `try_lock` without manual intervention.
//!
//! # Lock Record
//!
//! The file content is JSON metadata for diagnostics and staleness checks:
//! - `user`, `host`, `pid`: the holder
//! - `acquired_at`, `last_heartbeat`: RFC3339 timestamps
//! - `generation`: acquisition counter
//!
//! A stale heartbeat is a suspicion, not proof of death. Acquisition never
//! breaks a lock whose OS lock is still held; only an explicit,
//! user-confirmed `force_break` does.
//!
//! # Handles
//!
//! A successful acquisition returns a `LockHandle` that owns the locked
//! descriptor and a heartbeat thread. Dropping the handle releases the lock.
//! If a heartbeat write fails the handle turns `Lost` and a `LockLost`
//! notification is delivered on its channel.

mod advisory;
mod backoff;
mod cancel;
mod client;
mod handle;
mod heartbeat;
mod record;
mod types;


// Re-export public API
pub use advisory::{
    AdvisoryFileLock, OsFileLock, is_contended, is_delete_pending, is_same_file, is_unsupported,
};
pub use backoff::Backoff;
pub use cancel::CancelToken;
pub use client::{LockClient, status};
pub use handle::LockHandle;
pub use record::{LockRecord, Owner, RecordRead, read_record};
pub use types::{
    AcquireTimeout, BreakConfirmation, ForceBreakOutcome, HandleState, LockInfo, LockLost,
};
