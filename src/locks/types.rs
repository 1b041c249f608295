//! Lock state, timeout, and diagnostic types.

use super::record::{LockRecord, Owner};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long `acquire` may wait for a busy lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireTimeout {
    /// A single non-blocking attempt.
    NoWait,
    /// Retry until the duration has elapsed.
    Within(Duration),
    /// Retry until success or cancellation.
    Unbounded,
}

impl AcquireTimeout {
    /// Deadline for an acquisition starting at `start`, `None` when unbounded.
    pub fn deadline_from(self, start: Instant) -> Option<Instant> {
        match self {
            AcquireTimeout::NoWait => Some(start),
            AcquireTimeout::Within(limit) => start.checked_add(limit),
            AcquireTimeout::Unbounded => None,
        }
    }
}

impl From<Option<Duration>> for AcquireTimeout {
    fn from(timeout: Option<Duration>) -> Self {
        match timeout {
            None => AcquireTimeout::Unbounded,
            Some(limit) if limit.is_zero() => AcquireTimeout::NoWait,
            Some(limit) => AcquireTimeout::Within(limit),
        }
    }
}

/// Lifecycle state of a `LockHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Unlocked,
    /// The OS lock is taken and the first record is being written.
    Acquiring,
    Held,
    /// A heartbeat write is in progress.
    Heartbeating,
    Releasing,
    /// A heartbeat write failed. Exclusivity can no longer be assumed.
    Lost,
}

impl HandleState {
    pub fn is_held(self) -> bool {
        matches!(self, HandleState::Held | HandleState::Heartbeating)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandleState::Unlocked => "unlocked",
            HandleState::Acquiring => "acquiring",
            HandleState::Held => "held",
            HandleState::Heartbeating => "heartbeating",
            HandleState::Releasing => "releasing",
            HandleState::Lost => "lost",
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification sent when a held lock can no longer be trusted.
///
/// The application must stop writing to the datastore until it acquires the
/// lock again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLost {
    pub path: PathBuf,
    pub owner: Owner,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
}

impl fmt::Display for LockLost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lock '{}' held by {} was lost at {}: {}",
            self.path.display(),
            self.owner,
            self.detected_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.reason
        )
    }
}

/// Read-only view of a lock file for display.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The decoded record.
    pub record: LockRecord,

    /// Time since the last heartbeat when the record was read.
    pub heartbeat_age: Duration,

    /// Whether the heartbeat exceeded the stale timeout. A suspicion only.
    pub is_stale: bool,
}

impl LockInfo {
    pub fn from_record(
        path: PathBuf,
        record: LockRecord,
        stale_timeout: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            path,
            heartbeat_age: record.heartbeat_age_at(now),
            is_stale: record.is_stale_at(now, stale_timeout),
            record,
        }
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database is in use by {} on {} since {} (pid {}, generation {}{})",
            self.record.owner.user,
            self.record.owner.host,
            self.record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.record.owner.pid,
            self.record.generation,
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

/// Proof that a user explicitly confirmed a force-break.
///
/// `acquire` never constructs one; only application code reacting to a
/// separate user action should.
#[derive(Debug)]
pub struct BreakConfirmation {
    _private: (),
}

impl BreakConfirmation {
    pub fn user_confirmed() -> Self {
        Self { _private: () }
    }
}

/// Result of a force-break request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceBreakOutcome {
    /// Nobody held the OS lock; nothing was broken.
    NotHeld,
    /// The lock file was deleted and recreated.
    Broken { previous: LockRecord },
}
