//! LockConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Timing and naming configuration for the exclusive access lock.
///
/// Durations are stored as milliseconds so the YAML stays plain integers.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// File name of the lock file inside the shared folder.
    #[serde(default = "default_lock_file_name")]
    pub lock_file_name: String,

    // =========================================================================
    // Liveness
    // =========================================================================
    /// Heartbeat age after which a holder is suspected dead.
    #[serde(default = "default_stale_timeout_ms")]
    pub stale_timeout_ms: u64,

    /// Interval between heartbeat writes. Must be at most a fifth of
    /// `stale_timeout_ms`.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    // =========================================================================
    // Retry
    // =========================================================================
    /// First backoff sleep between acquisition attempts.
    #[serde(default = "default_retry_backoff_min_ms")]
    pub retry_backoff_min_ms: u64,

    /// Upper bound for the doubling backoff sleep.
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    // =========================================================================
    // Force break
    // =========================================================================
    /// Multiple of `stale_timeout_ms` a heartbeat must exceed before a
    /// user-confirmed force-break is allowed.
    #[serde(default = "default_force_break_safety_factor")]
    pub force_break_safety_factor: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_file_name: default_lock_file_name(),
            stale_timeout_ms: default_stale_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            retry_backoff_min_ms: default_retry_backoff_min_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            force_break_safety_factor: default_force_break_safety_factor(),
        }
    }
}
