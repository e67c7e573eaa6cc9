//! Serialises hook invocations.
//!
//! LXC may start several containers at once, each running this hook. The
//! kernel state the hook edits is host-wide, so invocations take an
//! exclusive `flock` on a shared lock file for their whole run.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use ctctl_common::{CtctlError, CtctlResult};
use rustix::fs::{FlockOperation, flock};
use rustix::io::Errno;

/// An exclusive lock, released on drop.
#[derive(Debug)]
pub struct InvocationLock {
    path: PathBuf,
    _file: File,
}

impl InvocationLock {
    /// Block until the lock at `path` is held.
    pub fn acquire(path: &Path) -> CtctlResult<Self> {
        let file = open(path)?;
        flock(&file, FlockOperation::LockExclusive).map_err(|e| lock_error(path, e))?;
        tracing::debug!(path = %path.display(), "Acquired invocation lock");

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(path: &Path) -> CtctlResult<Option<Self>> {
        let file = open(path)?;
        match flock(&file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                _file: file,
            })),
            Err(Errno::WOULDBLOCK) => Ok(None),
            Err(e) => Err(lock_error(path, e)),
        }
    }

    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open(path: &Path) -> CtctlResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CtctlError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
    }

    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|source| CtctlError::Lock {
            path: path.to_path_buf(),
            source,
        })
}

fn lock_error(path: &Path, errno: Errno) -> CtctlError {
    CtctlError::Lock {
        path: path.to_path_buf(),
        source: errno.into(),
    }
}
