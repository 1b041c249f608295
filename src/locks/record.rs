//! Lock record codec: owner identity, timestamps, and generation stored in the lock file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

/// Identity of a lock holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Login name of the user running the holder process.
    pub user: String,

    /// Host name of the machine running the holder process.
    pub host: String,

    /// Process ID of the holder on `host`.
    pub pid: u32,
}

impl Owner {
    pub fn new(user: impl Into<String>, host: impl Into<String>, pid: u32) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            pid,
        }
    }

    /// Identity of the current process.
    pub fn current() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self::new(user, host, std::process::id())
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (pid {})", self.user, self.host, self.pid)
    }
}

/// Lock metadata stored in the lock file.
///
/// The record is advisory: ownership is decided by the OS lock on the file,
/// the record only tells other clients who holds it and whether the holder
/// still heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    #[serde(flatten)]
    pub owner: Owner,

    /// When the current holder acquired the lock (RFC3339).
    pub acquired_at: DateTime<Utc>,

    /// Last successful heartbeat write (RFC3339).
    pub last_heartbeat: DateTime<Utc>,

    /// Incremented on every successful acquisition. Diagnostic only.
    pub generation: u64,
}

/// Outcome of a best-effort record read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRead {
    /// No lock file, or a lock file without content.
    Missing,
    /// The file exists but could not be read or decoded.
    Unreadable(String),
    Found(LockRecord),
}

impl LockRecord {
    /// Create a record for a fresh acquisition at `now`.
    pub fn new(owner: Owner, now: DateTime<Utc>, generation: u64) -> Self {
        Self {
            owner,
            acquired_at: now,
            last_heartbeat: now,
            generation,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Advance `last_heartbeat` to `now`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_heartbeat {
            self.last_heartbeat = now;
        }
    }

    /// Time since the last heartbeat. A heartbeat stamped in the future
    /// (clock skew between machines) counts as zero.
    pub fn heartbeat_age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_heartbeat)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Check if the heartbeat is older than `stale_timeout`.
    ///
    /// Staleness is a suspicion, never proof that the holder is gone.
    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_timeout: Duration) -> bool {
        self.heartbeat_age_at(now) > stale_timeout
    }

    /// Format the heartbeat age as a human-readable string.
    pub fn age_string(&self, now: DateTime<Utc>) -> String {
        let secs = self.heartbeat_age_at(now).as_secs();
        let (minutes, hours, days) = (secs / 60, secs / 3600, secs / 86_400);

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, secs % 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Read the record at `path` without taking any lock.
pub fn read_record(path: &Path) -> RecordRead {
    match std::fs::read(path) {
        Ok(bytes) => decode_content(&bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => RecordRead::Missing,
        Err(e) => RecordRead::Unreadable(format!("failed to read: {}", e)),
    }
}

/// Read the record through an already open lock file.
pub fn read_record_from(file: &File) -> RecordRead {
    let mut reader = file;
    let mut bytes = Vec::new();
    let read = reader
        .seek(SeekFrom::Start(0))
        .and_then(|_| reader.read_to_end(&mut bytes));
    match read {
        Ok(_) => decode_content(&bytes),
        Err(e) => RecordRead::Unreadable(format!("failed to read: {}", e)),
    }
}

/// Overwrite the lock file's content with `record` in place and flush it.
///
/// The write goes through the descriptor that holds the OS lock; replacing
/// the file (write-then-rename) would detach the lock from the path.
pub fn write_record_to(file: &File, record: &LockRecord) -> io::Result<()> {
    let bytes = record.encode().map_err(io::Error::other)?;
    let mut writer = file;
    writer.seek(SeekFrom::Start(0))?;
    writer.write_all(&bytes)?;
    file.set_len(bytes.len() as u64)?;
    file.sync_data()
}

fn decode_content(bytes: &[u8]) -> RecordRead {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return RecordRead::Missing;
    }
    match LockRecord::decode(bytes) {
        Ok(record) => RecordRead::Found(record),
        Err(e) => RecordRead::Unreadable(format!("failed to parse: {}", e)),
    }
}
