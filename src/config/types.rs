//! Configuration constants and defaults for sharelock.

/// Name of the optional config file looked up in the shared folder.
pub const CONFIG_FILE_NAME: &str = ".sharelock.yaml";

/// Minimum ratio between the stale timeout and the heartbeat interval.
pub const HEARTBEATS_PER_STALE_TIMEOUT: u64 = 5;

// Environment overrides
pub const ENV_LOCK_FILE_NAME: &str = "SHARELOCK_LOCK_FILE_NAME";
pub const ENV_STALE_TIMEOUT_MS: &str = "SHARELOCK_STALE_TIMEOUT_MS";
pub const ENV_HEARTBEAT_INTERVAL_MS: &str = "SHARELOCK_HEARTBEAT_INTERVAL_MS";
pub const ENV_RETRY_BACKOFF_MIN_MS: &str = "SHARELOCK_RETRY_BACKOFF_MIN_MS";
pub const ENV_RETRY_BACKOFF_MAX_MS: &str = "SHARELOCK_RETRY_BACKOFF_MAX_MS";
pub const ENV_FORCE_BREAK_SAFETY_FACTOR: &str = "SHARELOCK_FORCE_BREAK_SAFETY_FACTOR";

// Default value functions for serde
pub(crate) fn default_lock_file_name() -> String {
    ".lock".to_string()
}
pub(crate) fn default_stale_timeout_ms() -> u64 {
    30_000
}
pub(crate) fn default_heartbeat_interval_ms() -> u64 {
    5_000
}
pub(crate) fn default_retry_backoff_min_ms() -> u64 {
    250
}
pub(crate) fn default_retry_backoff_max_ms() -> u64 {
    2_000
}
pub(crate) fn default_force_break_safety_factor() -> u32 {
    3
}
