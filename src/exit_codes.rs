//! Exit code constants for the sharelock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid configuration)
//! - 2: Lock busy (held by a live process)
//! - 3: Lock unavailable (the filesystem does not honor exclusive locks)
//! - 4: Lock lost while held
//! - 5: I/O failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, refused force-break.
pub const USER_ERROR: i32 = 1;

/// The lock is held by another process and could not be acquired in time.
pub const LOCK_BUSY: i32 = 2;

/// The shared folder does not support exclusive file locks.
pub const LOCK_UNAVAILABLE: i32 = 3;

/// A held lock was lost (heartbeat write failed).
pub const LOCK_LOST: i32 = 4;

/// Unexpected filesystem failure.
pub const IO_FAILURE: i32 = 5;
