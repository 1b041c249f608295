//! Background liveness writer for a held lock.

use super::advisory::is_same_file;
use super::handle::{SharedInner, lock_inner};
use super::record::{LockRecord, write_record_to};
use super::types::{HandleState, LockLost};
use chrono::Utc;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One heartbeat thread bound to one handle.
///
/// Every interval the thread rewrites `last_heartbeat` through the handle's
/// own descriptor. The first failed write marks the handle `Lost`, sends a
/// `LockLost` notification, and ends the thread.
#[derive(Debug)]
pub(super) struct HeartbeatService {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl HeartbeatService {
    pub(super) fn start(
        interval: Duration,
        path: PathBuf,
        shared: SharedInner,
        loss_tx: Sender<LockLost>,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("sharelock-heartbeat".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    match beat(&path, &shared) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(lost) => {
                            tracing::warn!(
                                path = %path.display(),
                                reason = %lost.reason,
                                "heartbeat failed; lock is lost"
                            );
                            let _ = loss_tx.send(lost);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it to finish its current tick.
    pub(super) fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("heartbeat thread panicked");
        }
    }
}

impl Drop for HeartbeatService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run one tick. `Ok(false)` means the handle is no longer held and the
/// thread should exit quietly.
///
/// The handle mutex is only held to snapshot and to commit, never across the
/// write and flush, so state queries do not wait on a slow share.
fn beat(path: &Path, shared: &SharedInner) -> Result<bool, LockLost> {
    let (file, mut next) = {
        let mut inner = lock_inner(shared);
        if inner.state != HandleState::Held {
            return Ok(false);
        }
        let Some(file) = inner.file.clone() else {
            return Ok(false);
        };
        inner.state = HandleState::Heartbeating;
        (file, inner.record.clone())
    };

    let outcome = refresh(path, &file, &mut next);
    drop(file);

    let mut inner = lock_inner(shared);
    match outcome {
        Ok(()) => {
            inner.record = next;
            inner.state = HandleState::Held;
            tracing::trace!(
                path = %path.display(),
                generation = inner.record.generation,
                "heartbeat written"
            );
            Ok(true)
        }
        Err(reason) => {
            inner.state = HandleState::Lost;
            Err(LockLost {
                path: path.to_path_buf(),
                owner: inner.record.owner.clone(),
                reason,
                detected_at: Utc::now(),
            })
        }
    }
}

fn refresh(path: &Path, file: &File, next: &mut LockRecord) -> Result<(), String> {
    match is_same_file(file, path) {
        Ok(true) => {}
        Ok(false) => {
            return Err(format!(
                "lock file '{}' was removed or replaced",
                path.display()
            ));
        }
        Err(e) => return Err(format!("failed to inspect lock file: {}", e)),
    }

    next.touch(Utc::now());
    write_record_to(file, next).map_err(|e| format!("heartbeat write failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::advisory::{AdvisoryFileLock, OsFileLock};
    use crate::locks::handle::HandleInner;
    use crate::locks::record::{Owner, RecordRead, read_record};
    use chrono::Duration as ChronoDuration;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn held(path: &Path, state: HandleState) -> SharedInner {
        let file = OsFileLock.try_lock(path).unwrap().unwrap();
        let at = Utc::now() - ChronoDuration::seconds(5);
        let record = LockRecord::new(Owner::new("marie", "WH-PC-04", 7), at, 2);
        write_record_to(&file, &record).unwrap();
        Arc::new(Mutex::new(HandleInner {
            state,
            file: Some(Arc::new(file)),
            record,
        }))
    }

    #[test]
    fn beat_commits_the_touched_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".lock");
        let shared = held(&path, HandleState::Held);
        let before = lock_inner(&shared).record.clone();

        assert_eq!(beat(&path, &shared), Ok(true));

        let inner = lock_inner(&shared);
        assert_eq!(inner.state, HandleState::Held);
        assert!(inner.record.last_heartbeat > before.last_heartbeat);
        assert_eq!(inner.record.acquired_at, before.acquired_at);
        // Only the handle keeps the descriptor after the tick.
        assert_eq!(Arc::strong_count(inner.file.as_ref().unwrap()), 1);
        assert_eq!(read_record(&path), RecordRead::Found(inner.record.clone()));
    }

    #[test]
    fn beat_skips_a_handle_that_is_not_held() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".lock");
        let shared = held(&path, HandleState::Releasing);
        let before = lock_inner(&shared).record.clone();

        assert_eq!(beat(&path, &shared), Ok(false));
        assert_eq!(lock_inner(&shared).record, before);
        assert_eq!(lock_inner(&shared).state, HandleState::Releasing);
    }

    #[test]
    fn beat_on_a_removed_file_marks_the_handle_lost() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".lock");
        let shared = held(&path, HandleState::Held);
        std::fs::remove_file(&path).unwrap();

        let lost = beat(&path, &shared).unwrap_err();
        assert!(lost.reason.contains("removed or replaced"));
        assert_eq!(lost.owner, Owner::new("marie", "WH-PC-04", 7));
        assert_eq!(lock_inner(&shared).state, HandleState::Lost);
        assert!(!path.exists());
    }
}
