use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

/// A non-blocking advisory lock on a lock file. Released on drop.
///
/// fs2 methods are called through `FileExt` explicitly: newer std versions
/// grew inherent `File` lock methods with the same names.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
    kind: LockKind,
}

impl LockFile {
    pub fn try_acquire(path: impl AsRef<Path>, kind: LockKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Lock {
                path: path.clone(),
                source: e,
            })?;

        let locked = match kind {
            LockKind::Shared => FileExt::try_lock_shared(&file),
            LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
        };

        match locked {
            Ok(()) => {}
            Err(e) if is_contended(&e) => return Err(Error::LockUnavailable { path }),
            Err(e) => return Err(Error::Lock { path, source: e }),
        }

        // Another process may have removed and recreated the lock file between
        // our open and the lock call; our lock would then guard nothing.
        if !still_linked(&file, &path) {
            let _ = FileExt::unlock(&file);
            return Err(Error::LockUnavailable { path });
        }

        tracing::trace!(path = %path.display(), ?kind, "lock acquired");
        Ok(Self { file, path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Tries to convert a shared lock to exclusive without blocking.
    ///
    /// On failure the lock may have been dropped entirely, so callers should
    /// only do this when about to release anyway.
    pub fn try_upgrade(&mut self) -> bool {
        if self.kind == LockKind::Exclusive {
            return true;
        }
        match FileExt::try_lock_exclusive(&self.file) {
            Ok(()) => {
                self.kind = LockKind::Exclusive;
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.ino() == current.ino() && held.dev() == current.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}
