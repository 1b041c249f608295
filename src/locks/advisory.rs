//! OS-level exclusive file locks.
//!
//! `AdvisoryFileLock` is pure mechanism: open a file and try to take an
//! exclusive, non-blocking lock on it. `OsFileLock` maps that onto
//! `flock(LOCK_EX | LOCK_NB)` on Unix and `LockFileEx` on Windows through
//! `fs2`. The lock belongs to the open descriptor, so the OS drops it when the
//! holding process dies.

use fs2::FileExt;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Exclusive, non-blocking file lock primitive.
pub trait AdvisoryFileLock: Send + Sync + fmt::Debug {
    /// Open `path` (creating it if missing) and try to lock it exclusively.
    ///
    /// Returns `Ok(None)` when another descriptor holds the lock. Two racing
    /// callers on the same file resolve to exactly one `Some`.
    fn try_lock(&self, path: &Path) -> io::Result<Option<File>>;

    /// Release a lock obtained from `try_lock`.
    fn unlock(&self, file: &File) -> io::Result<()>;

    /// Check whether files in `dir` honor exclusive locks.
    ///
    /// Some network and cloud-sync filesystems accept lock calls without
    /// enforcing them. The default probe locks a scratch file, checks that a
    /// second descriptor is refused, unlocks, and checks that the second
    /// descriptor now gets through. Anything else reports `false`.
    fn supports_locking(&self, dir: &Path) -> io::Result<bool> {
        probe_locking(self, dir)
    }
}

/// Production lock backed by the platform's native primitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileLock;

impl AdvisoryFileLock for OsFileLock {
    fn try_lock(&self, path: &Path) -> io::Result<Option<File>> {
        let opened = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path);
        let file = match opened {
            Ok(file) => file,
            Err(e) if is_delete_pending(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(file)),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        FileExt::unlock(file)
    }
}

/// True when a lock call failed only because someone else holds the lock.
pub fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// True when opening the lock file failed because a releasing holder has
/// deleted it but not yet closed its descriptor.
///
/// Windows and SMB shares keep such a file in a delete-pending state and
/// refuse every open with `ERROR_ACCESS_DENIED` until the last handle closes.
/// Unix unlinks immediately, so a permission error there is a real one.
pub fn is_delete_pending(err: &io::Error) -> bool {
    cfg!(windows) && err.kind() == io::ErrorKind::PermissionDenied
}

/// True when a lock call failed because the filesystem cannot lock at all.
pub fn is_unsupported(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(
            err.raw_os_error(),
            Some(code) if code == libc::ENOLCK
                || code == libc::ENOTSUP
                || code == libc::EOPNOTSUPP
                || code == libc::ENOSYS
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Check that `path` still names the file behind `file`.
///
/// A lock taken on a descriptor whose file has since been unlinked or
/// replaced protects nothing: a newcomer opening the path gets a different
/// file and a free lock.
#[cfg(unix)]
pub fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check that `path` still names the file behind `file`.
///
/// Windows refuses to open a file pending deletion, so presence of the path
/// is the best available signal without unstable file-index APIs.
#[cfg(not(unix))]
pub fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    file.metadata()?;
    path.try_exists()
}

fn probe_locking<L: AdvisoryFileLock + ?Sized>(locker: &L, dir: &Path) -> io::Result<bool> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let probe_path = dir.join(format!(".sharelock-probe-{}-{}", std::process::id(), nanos));

    let outcome = run_probe(locker, &probe_path);
    let _ = fs::remove_file(&probe_path);

    match outcome {
        Ok(supported) => {
            tracing::debug!(dir = %dir.display(), supported, "lock capability probe finished");
            Ok(supported)
        }
        Err(e) if is_unsupported(&e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "filesystem rejected lock call");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn run_probe<L: AdvisoryFileLock + ?Sized>(locker: &L, path: &Path) -> io::Result<bool> {
    let Some(first) = locker.try_lock(path)? else {
        // Nobody else knows this file name.
        return Ok(false);
    };

    if let Some(second) = locker.try_lock(path)? {
        let _ = locker.unlock(&second);
        let _ = locker.unlock(&first);
        return Ok(false);
    }

    locker.unlock(&first)?;
    drop(first);

    match locker.try_lock(path)? {
        Some(third) => {
            locker.unlock(&third)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
