//! Config loading, environment overrides, validation, and duration accessors.

use super::model::LockConfig;
use super::types::*;
use crate::error::{LockError, Result};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LockConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Resolve the effective configuration for a shared folder.
    ///
    /// Precedence, lowest first: defaults, the YAML file (`explicit` if given,
    /// otherwise `<shared_folder>/.sharelock.yaml` when it exists), then
    /// `SHARELOCK_*` environment variables. The merged result is validated.
    pub fn resolve(shared_folder: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let candidate = shared_folder.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name.
    ///
    /// `lookup` returns the raw value for a key, or `None` when unset. Values
    /// that do not parse are reported as configuration errors rather than
    /// ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_LOCK_FILE_NAME) {
            self.lock_file_name = name;
        }
        override_number(&lookup, ENV_STALE_TIMEOUT_MS, &mut self.stale_timeout_ms)?;
        override_number(
            &lookup,
            ENV_HEARTBEAT_INTERVAL_MS,
            &mut self.heartbeat_interval_ms,
        )?;
        override_number(
            &lookup,
            ENV_RETRY_BACKOFF_MIN_MS,
            &mut self.retry_backoff_min_ms,
        )?;
        override_number(
            &lookup,
            ENV_RETRY_BACKOFF_MAX_MS,
            &mut self.retry_backoff_max_ms,
        )?;
        override_number(
            &lookup,
            ENV_FORCE_BREAK_SAFETY_FACTOR,
            &mut self.force_break_safety_factor,
        )?;
        Ok(())
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_file_name` must be a plain, non-empty file name without surrounding whitespace
    /// - `stale_timeout_ms` must be positive
    /// - `heartbeat_interval_ms` must be positive and at most `stale_timeout_ms / 5`
    /// - `retry_backoff_min_ms` must be positive and not exceed `retry_backoff_max_ms`
    /// - `force_break_safety_factor` must be at least 1
    pub fn validate(&self) -> Result<()> {
        let name = self.lock_file_name.as_str();
        if name.trim().is_empty() || name == "." || name == ".." {
            return Err(LockError::Config(
                "lock_file_name must be a non-empty file name".to_string(),
            ));
        }
        if name.trim() != name {
            return Err(LockError::Config(format!(
                "lock_file_name must not start or end with whitespace (found '{}')",
                self.lock_file_name
            )));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(LockError::Config(format!(
                "lock_file_name must not contain path separators (found '{}')",
                self.lock_file_name
            )));
        }

        if self.stale_timeout_ms == 0 {
            return Err(LockError::Config(
                "stale_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(LockError::Config(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.heartbeat_interval_ms > self.stale_timeout_ms / HEARTBEATS_PER_STALE_TIMEOUT {
            return Err(LockError::Config(format!(
                "heartbeat_interval_ms ({}) must be at most stale_timeout_ms / {} ({})",
                self.heartbeat_interval_ms,
                HEARTBEATS_PER_STALE_TIMEOUT,
                self.stale_timeout_ms / HEARTBEATS_PER_STALE_TIMEOUT
            )));
        }

        if self.retry_backoff_min_ms == 0 {
            return Err(LockError::Config(
                "retry_backoff_min_ms must be greater than 0".to_string(),
            ));
        }
        if self.retry_backoff_min_ms > self.retry_backoff_max_ms {
            return Err(LockError::Config(format!(
                "retry_backoff_min_ms ({}) must not exceed retry_backoff_max_ms ({})",
                self.retry_backoff_min_ms, self.retry_backoff_max_ms
            )));
        }

        if self.force_break_safety_factor == 0 {
            return Err(LockError::Config(
                "force_break_safety_factor must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn retry_backoff_min(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_min_ms)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms)
    }

    /// Heartbeat age beyond which a user-confirmed force-break is permitted.
    pub fn force_break_threshold(&self) -> Duration {
        self.stale_timeout()
            .saturating_mul(self.force_break_safety_factor)
    }
}

fn override_number<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| {
            LockError::Config(format!("{} must be a non-negative integer (got '{}')", key, raw))
        })?;
    }
    Ok(())
}
