//! RAII handle for a held lock.

use super::advisory::{AdvisoryFileLock, is_same_file};
use super::heartbeat::HeartbeatService;
use super::record::{LockRecord, Owner, write_record_to};
use super::types::{HandleState, LockLost};
use crate::error::{LockError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// State shared between a handle and its heartbeat thread.
#[derive(Debug)]
pub(super) struct HandleInner {
    pub(super) state: HandleState,
    /// Descriptor holding the OS lock; `None` once released. The heartbeat
    /// borrows a clone for the duration of a write, so release, which joins
    /// the heartbeat first, always ends up with the last reference.
    pub(super) file: Option<Arc<File>>,
    pub(super) record: LockRecord,
}

pub(super) type SharedInner = Arc<Mutex<HandleInner>>;

pub(super) fn lock_inner(shared: &Mutex<HandleInner>) -> MutexGuard<'_, HandleInner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A held exclusive lock.
///
/// Dropping the handle releases the lock. `release` can also be called
/// explicitly; it is idempotent and never fails.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    owner: Owner,
    shared: SharedInner,
    heartbeat: Option<HeartbeatService>,
    locker: Arc<dyn AdvisoryFileLock>,
    loss_rx: Option<Receiver<LockLost>>,
}

impl LockHandle {
    /// Write the first record through `file`, which already holds the OS
    /// lock on `path`, and start heartbeating.
    ///
    /// On failure the returned error drops the half-built handle, which
    /// unlocks `file`.
    pub(super) fn establish(
        path: PathBuf,
        file: File,
        record: LockRecord,
        locker: Arc<dyn AdvisoryFileLock>,
        heartbeat_interval: Duration,
    ) -> Result<Self> {
        let owner = record.owner.clone();
        let shared = Arc::new(Mutex::new(HandleInner {
            state: HandleState::Acquiring,
            file: Some(Arc::new(file)),
            record,
        }));
        let (loss_tx, loss_rx) = mpsc::channel();

        let mut handle = LockHandle {
            path,
            owner,
            shared,
            heartbeat: None,
            locker,
            loss_rx: Some(loss_rx),
        };

        {
            let mut inner = lock_inner(&handle.shared);
            let inner = &mut *inner;
            if let Some(file) = inner.file.as_ref() {
                write_record_to(file, &inner.record).map_err(|e| {
                    LockError::io(
                        format!("failed to write lock record '{}'", handle.path.display()),
                        e,
                    )
                })?;
            }
            inner.state = HandleState::Held;
        }

        let service = HeartbeatService::start(
            heartbeat_interval,
            handle.path.clone(),
            Arc::clone(&handle.shared),
            loss_tx,
        )
        .map_err(|e| LockError::io("failed to start heartbeat thread", e))?;
        handle.heartbeat = Some(service);

        Ok(handle)
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity this lock was acquired with.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn state(&self) -> HandleState {
        lock_inner(&self.shared).state
    }

    /// Whether exclusivity can still be assumed. Turns false once the lock
    /// is released or lost.
    pub fn is_held(&self) -> bool {
        self.state().is_held()
    }

    /// Snapshot of the record last written by this handle.
    pub fn record(&self) -> LockRecord {
        lock_inner(&self.shared).record.clone()
    }

    pub fn generation(&self) -> u64 {
        lock_inner(&self.shared).record.generation
    }

    /// Take the channel on which a `LockLost` notification is delivered.
    ///
    /// Returns `None` after the first call.
    pub fn take_loss_receiver(&mut self) -> Option<Receiver<LockLost>> {
        self.loss_rx.take()
    }

    /// Release the lock.
    ///
    /// Stops the heartbeat, deletes the lock file while the OS lock is still
    /// held (best-effort), then unlocks and closes the descriptor. Safe to
    /// call repeatedly and on a lost handle.
    pub fn release(&mut self) {
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }

        let mut inner = lock_inner(&self.shared);
        let Some(file) = inner.file.take() else {
            return;
        };
        let previous = inner.state;
        inner.state = HandleState::Releasing;

        // A lost handle may no longer own the path; leave it alone.
        if previous.is_held() {
            self.remove_lock_file(&file);
        }

        if let Err(e) = self.locker.unlock(&file) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "explicit unlock failed; closing the descriptor releases the lock"
            );
        }
        drop(file);

        inner.state = if previous == HandleState::Lost {
            HandleState::Lost
        } else {
            HandleState::Unlocked
        };
        tracing::info!(
            path = %self.path.display(),
            generation = inner.record.generation,
            "lock released"
        );
    }

    fn remove_lock_file(&self, file: &File) {
        match is_same_file(file, &self.path) {
            Ok(true) => {
                if let Err(e) = fs::remove_file(&self.path) {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "failed to delete lock file; the next holder will overwrite it"
                    );
                }
            }
            Ok(false) => tracing::warn!(
                path = %self.path.display(),
                "lock file was removed or replaced by someone else; leaving it in place"
            ),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "could not inspect lock file before deleting it"
            ),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}
