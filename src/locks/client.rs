//! Lock acquisition, status, and force-break operations.

use super::advisory::{AdvisoryFileLock, OsFileLock, is_same_file, is_unsupported};
use super::backoff::Backoff;
use super::cancel::CancelToken;
use super::handle::LockHandle;
use super::record::{LockRecord, Owner, RecordRead, read_record, read_record_from};
use super::types::{AcquireTimeout, BreakConfirmation, ForceBreakOutcome, LockInfo};
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Entry point for locking one shared folder.
///
/// Construct one per datastore location and pass it to whatever needs it.
/// Construction runs the lock capability probe once against the folder.
#[derive(Debug, Clone)]
pub struct LockClient {
    lock_path: PathBuf,
    config: LockConfig,
    locker: Arc<dyn AdvisoryFileLock>,
    capability: Capability,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Capability {
    Supported,
    Unsupported(String),
}

enum Attempt {
    Acquired(LockHandle),
    Contended(RecordRead),
}

impl LockClient {
    /// Create a client for `shared_folder` using the platform lock.
    pub fn new(shared_folder: impl AsRef<Path>, config: LockConfig) -> Result<Self> {
        Self::with_locker(shared_folder, config, Arc::new(OsFileLock))
    }

    /// Create a client with a specific lock implementation.
    ///
    /// # Errors
    ///
    /// * `LockError::Config` - `config` is invalid
    /// * `LockError::Io` - the folder cannot be probed (missing, no permission)
    ///
    /// A folder whose filesystem does not enforce locks is not an error here;
    /// every later `acquire` reports `LockError::Unavailable` instead.
    pub fn with_locker(
        shared_folder: impl AsRef<Path>,
        config: LockConfig,
        locker: Arc<dyn AdvisoryFileLock>,
    ) -> Result<Self> {
        config.validate()?;
        let folder = shared_folder.as_ref();
        let lock_path = folder.join(&config.lock_file_name);

        let capability = match locker.supports_locking(folder) {
            Ok(true) => Capability::Supported,
            Ok(false) => {
                tracing::warn!(
                    dir = %folder.display(),
                    "filesystem does not enforce exclusive locks; locking disabled"
                );
                Capability::Unsupported(
                    "a probe lock on this filesystem was not exclusive".to_string(),
                )
            }
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to probe lock support in '{}'", folder.display()),
                    e,
                ));
            }
        };

        Ok(Self {
            lock_path,
            config,
            locker,
            capability,
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Result of the startup capability probe.
    pub fn supports_locking(&self) -> bool {
        self.capability == Capability::Supported
    }

    /// Acquire the lock for `owner`, waiting up to `timeout`.
    pub fn acquire(&self, timeout: AcquireTimeout, owner: &Owner) -> Result<LockHandle> {
        self.acquire_cancellable(timeout, owner, &CancelToken::new())
    }

    /// Acquire the lock, giving up early when `cancel` fires.
    ///
    /// A stale heartbeat on a lock whose OS lock is still held is only logged:
    /// the holder may be frozen rather than dead, and a dead holder's OS lock
    /// is released by the OS, letting the next attempt succeed on its own.
    ///
    /// # Errors
    ///
    /// * `LockError::Busy` - timed out or cancelled; carries the last holder seen
    /// * `LockError::Unavailable` - the folder does not support exclusive locks
    /// * `LockError::Io` - any other filesystem failure
    pub fn acquire_cancellable(
        &self,
        timeout: AcquireTimeout,
        owner: &Owner,
        cancel: &CancelToken,
    ) -> Result<LockHandle> {
        self.ensure_supported()?;

        let deadline = timeout.deadline_from(Instant::now());
        let mut backoff = Backoff::new(
            self.config.retry_backoff_min(),
            self.config.retry_backoff_max(),
        );
        let mut holder: Option<LockRecord> = None;
        let mut reported_stale = false;
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(path = %self.lock_path.display(), "acquire cancelled");
                return Err(self.busy(holder));
            }

            attempts += 1;
            match self.attempt(owner)? {
                Attempt::Acquired(handle) => {
                    tracing::info!(
                        path = %self.lock_path.display(),
                        generation = handle.generation(),
                        attempts,
                        "lock acquired"
                    );
                    return Ok(handle);
                }
                Attempt::Contended(read) => {
                    if let Some(record) = self.observe(read, &mut reported_stale) {
                        holder = Some(record);
                    }
                }
            }

            let mut delay = backoff.next_delay();
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(self.busy(holder));
                }
                delay = delay.min(deadline - now);
            }

            if cancel.wait_timeout(delay) {
                tracing::debug!(path = %self.lock_path.display(), "acquire cancelled");
                return Err(self.busy(holder));
            }
        }
    }

    /// Read-only view of the current lock record.
    pub fn status(&self) -> Result<Option<LockInfo>> {
        status(&self.lock_path, &self.config)
    }

    /// Delete and recreate the lock file without proof that its holder died.
    ///
    /// Only for filesystems that do not release locks of crashed processes.
    /// Refused unless the OS lock is held by someone and the recorded
    /// heartbeat is older than `stale_timeout * force_break_safety_factor`.
    /// A holder that is merely slow ends up sharing the datastore, so this
    /// must only follow an explicit user decision.
    pub fn force_break(&self, _confirmation: BreakConfirmation) -> Result<ForceBreakOutcome> {
        self.ensure_supported()?;

        match self.locker.try_lock(&self.lock_path) {
            Ok(Some(file)) => {
                let _ = self.locker.unlock(&file);
                return Ok(ForceBreakOutcome::NotHeld);
            }
            Ok(None) => {}
            Err(e) => return Err(self.lock_call_error(e)),
        }

        let previous = match read_record(&self.lock_path) {
            RecordRead::Found(record) => record,
            RecordRead::Missing => {
                return Err(self.refuse_break(
                    "the lock record is missing, so the holder cannot be shown to be stale",
                ));
            }
            RecordRead::Unreadable(reason) => {
                return Err(self.refuse_break(format!(
                    "the lock record is unreadable ({}), so the holder cannot be shown to be stale",
                    reason
                )));
            }
        };

        let age = previous.heartbeat_age_at(Utc::now());
        let threshold = self.config.force_break_threshold();
        if age <= threshold {
            return Err(self.refuse_break(format!(
                "last heartbeat from {} was {}ms ago, within the {}ms force-break threshold",
                previous.owner,
                age.as_millis(),
                threshold.as_millis()
            )));
        }

        tracing::warn!(
            path = %self.lock_path.display(),
            holder = %previous.owner,
            age_ms = age.as_millis() as u64,
            "force-breaking lock"
        );

        match fs::remove_file(&self.lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to delete lock file '{}'", self.lock_path.display()),
                    e,
                ));
            }
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to recreate lock file '{}'", self.lock_path.display()),
                    e,
                ));
            }
        }

        Ok(ForceBreakOutcome::Broken { previous })
    }

    fn attempt(&self, owner: &Owner) -> Result<Attempt> {
        let file = match self.locker.try_lock(&self.lock_path) {
            Ok(Some(file)) => file,
            Ok(None) => return Ok(Attempt::Contended(read_record(&self.lock_path))),
            Err(e) => return Err(self.lock_call_error(e)),
        };

        // The previous holder may have deleted the file between our open and
        // our lock; that lock guards an orphan.
        match is_same_file(&file, &self.lock_path) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    path = %self.lock_path.display(),
                    "locked a lock file that was just removed; retrying"
                );
                let _ = self.locker.unlock(&file);
                return Ok(Attempt::Contended(RecordRead::Missing));
            }
            Err(e) => {
                let _ = self.locker.unlock(&file);
                return Err(LockError::io(
                    format!("failed to inspect lock file '{}'", self.lock_path.display()),
                    e,
                ));
            }
        }

        let previous_generation = match read_record_from(&file) {
            RecordRead::Found(previous) => {
                tracing::debug!(
                    path = %self.lock_path.display(),
                    previous_holder = %previous.owner,
                    "overwriting record left by previous holder"
                );
                previous.generation
            }
            RecordRead::Missing | RecordRead::Unreadable(_) => 0,
        };

        let record = LockRecord::new(owner.clone(), Utc::now(), previous_generation + 1);
        let handle = LockHandle::establish(
            self.lock_path.clone(),
            file,
            record,
            Arc::clone(&self.locker),
            self.config.heartbeat_interval(),
        )?;
        Ok(Attempt::Acquired(handle))
    }

    /// Log what a contended attempt saw and return the holder, if known.
    fn observe(&self, read: RecordRead, reported_stale: &mut bool) -> Option<LockRecord> {
        match read {
            RecordRead::Found(record) => {
                let age = record.heartbeat_age_at(Utc::now());
                if age > self.config.stale_timeout() && !*reported_stale {
                    *reported_stale = true;
                    tracing::warn!(
                        path = %self.lock_path.display(),
                        holder = %record.owner,
                        age_ms = age.as_millis() as u64,
                        "holder heartbeat is stale but its OS lock is still held; waiting"
                    );
                }
                Some(record)
            }
            RecordRead::Unreadable(reason) => {
                tracing::debug!(
                    path = %self.lock_path.display(),
                    reason = %reason,
                    "lock record unreadable; holder unknown"
                );
                None
            }
            RecordRead::Missing => None,
        }
    }

    /// Fail with `LockError::Unavailable` when the startup probe found that
    /// the folder does not enforce exclusive locks.
    pub fn ensure_supported(&self) -> Result<()> {
        match &self.capability {
            Capability::Supported => Ok(()),
            Capability::Unsupported(reason) => Err(LockError::Unavailable {
                path: self.lock_path.clone(),
                reason: reason.clone(),
            }),
        }
    }

    fn lock_call_error(&self, err: io::Error) -> LockError {
        if is_unsupported(&err) {
            LockError::Unavailable {
                path: self.lock_path.clone(),
                reason: err.to_string(),
            }
        } else {
            LockError::io(
                format!("failed to lock '{}'", self.lock_path.display()),
                err,
            )
        }
    }

    fn busy(&self, holder: Option<LockRecord>) -> LockError {
        LockError::Busy {
            path: self.lock_path.clone(),
            holder,
        }
    }

    fn refuse_break(&self, reason: impl Into<String>) -> LockError {
        LockError::BreakRefused {
            path: self.lock_path.clone(),
            reason: reason.into(),
        }
    }
}

/// Read the lock file at `lock_path` without attempting acquisition.
///
/// # Returns
///
/// * `Ok(None)` - no lock file, or one without a record
/// * `Ok(Some(LockInfo))` - the recorded holder
/// * `Err(LockError::Corrupt)` - the record could not be read or decoded
pub fn status(lock_path: &Path, config: &LockConfig) -> Result<Option<LockInfo>> {
    match read_record(lock_path) {
        RecordRead::Missing => Ok(None),
        RecordRead::Unreadable(reason) => Err(LockError::Corrupt {
            path: lock_path.to_path_buf(),
            reason,
        }),
        RecordRead::Found(record) => Ok(Some(LockInfo::from_record(
            lock_path.to_path_buf(),
            record,
            config.stale_timeout(),
            Utc::now(),
        ))),
    }
}
