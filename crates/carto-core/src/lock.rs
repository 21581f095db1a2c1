//! Single-writer advisory lock for the store.
//!
//! A pid-stamped lockfile created with `create_new` guards all mutation.
//! Holders that died are reclaimed: liveness is probed with `kill(pid, 0)`
//! on unix, with a wall-clock stale threshold as the portable fallback.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::StoreError;

const LOCK_FILE: &str = "writer.lock";

/// Lockfiles older than this are considered abandoned regardless of pid.
const STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// How long to wait for a live holder before reporting contention.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Advisory writer-lock guard. Released automatically on drop.
pub struct WriterLock {
    path: PathBuf,
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl WriterLock {
    /// Acquire the writer lock inside the carto directory.
    ///
    /// Waits up to two seconds for a live holder, reclaims stale locks, and
    /// returns [`StoreError::LockContention`] when a live writer keeps it.
    pub fn acquire(carto_dir: &Path) -> Result<Self, StoreError> {
        let lock_path = carto_dir.join(LOCK_FILE);

        if let Some(lock) = try_create(&lock_path)? {
            return Ok(lock);
        }

        if holder_is_live(&lock_path) {
            // Wait briefly for the holder to finish, then give up.
            let deadline = SystemTime::now() + ACQUIRE_TIMEOUT;
            while SystemTime::now() < deadline {
                std::thread::sleep(Duration::from_millis(100));
                if let Some(lock) = try_create(&lock_path)? {
                    return Ok(lock);
                }
            }
            return Err(StoreError::LockContention(lock_path));
        }

        // Stale or unreadable lock: reclaim and retry once.
        let _ = fs::remove_file(&lock_path);
        match try_create(&lock_path)? {
            Some(lock) => Ok(lock),
            None => Err(StoreError::LockContention(lock_path)),
        }
    }
}

/// Atomic create: fails if the file already exists, avoiding TOCTOU races.
fn try_create(lock_path: &Path) -> Result<Option<WriterLock>, StoreError> {
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(mut file) => {
            let _ = write!(file, "{}", std::process::id());
            Ok(Some(WriterLock {
                path: lock_path.to_path_buf(),
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(StoreError::io(lock_path, &e)),
    }
}

/// Whether the recorded holder still exists and the lockfile is fresh.
fn holder_is_live(lock_path: &Path) -> bool {
    let age = fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok());
    if matches!(age, Some(a) if a > STALE_AFTER) {
        return false;
    }

    let pid = fs::read_to_string(lock_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok());
    match pid {
        Some(pid) => is_process_alive(pid),
        None => false,
    }
}

/// Check if a process is still alive (cross-platform).
fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Signal 0 checks if the process exists without sending a signal.
        // SAFETY: kill with signal 0 is a standard POSIX process existence check.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        // Conservative fallback: assume the holder is alive and let the
        // stale threshold decide.
        let _ = pid;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = WriterLock::acquire(dir.path()).unwrap();
            assert!(dir.path().join(LOCK_FILE).exists());
        }
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn contention_with_live_holder() {
        let dir = tempfile::tempdir().unwrap();
        let _held = WriterLock::acquire(dir.path()).unwrap();
        // Same process id counts as a live holder.
        let second = WriterLock::acquire(dir.path());
        assert!(matches!(second, Err(StoreError::LockContention(_))));
    }

    #[test]
    fn stale_lock_with_dead_pid_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        // Pid values this large are not in use on any realistic system.
        fs::write(dir.path().join(LOCK_FILE), "4194304999").unwrap();
        let lock = WriterLock::acquire(dir.path());
        assert!(lock.is_ok());
    }

    #[test]
    fn garbage_lockfile_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "not-a-pid").unwrap();
        let lock = WriterLock::acquire(dir.path());
        assert!(lock.is_ok());
    }
}
