use crate::lock::{LockFile, LockKind};
use crate::primitives::{PublishOptions, discard, publish, seed};
use crate::{Error, Result};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    /// Start from nothing, replace on commit.
    Write,
    /// Start from a copy of the current contents.
    ReadWrite,
    Append,
}

impl AccessMode {
    pub fn writes(self) -> bool {
        !matches!(self, Self::Read)
    }

    fn seeds_from_final(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Append)
    }

    fn lock_kind(self) -> LockKind {
        if self.writes() {
            LockKind::Exclusive
        } else {
            LockKind::Shared
        }
    }
}

/// Staged access to a single path.
///
/// Writers work on `X.tmp/X` while holding an exclusive lock on
/// `X.tmp/lock`; the staged entry replaces `X` only on [`commit`]. Readers
/// hold a shared lock on the same file and see `X` directly. The lock is
/// taken without blocking: contention surfaces as
/// [`Error::LockUnavailable`].
///
/// Dropping an unfinished transaction aborts it.
///
/// [`commit`]: FileTransaction::commit
#[derive(Debug)]
pub struct FileTransaction {
    path: PathBuf,
    temp_dir: PathBuf,
    temp_path: PathBuf,
    mode: AccessMode,
    lock: Option<LockFile>,
    finished: bool,
    publish: PublishOptions,
}

impl FileTransaction {
    pub fn begin(path: impl Into<PathBuf>, mode: AccessMode) -> Result<Self> {
        let path = path.into();
        let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
            return Err(Error::InvalidPath { path });
        };

        let temp_dir = staging_dir(&path, &file_name);
        let temp_path = temp_dir.join(&file_name);

        fs::create_dir_all(&temp_dir).map_err(|e| Error::Write {
            path: temp_dir.clone(),
            source: e,
        })?;
        let lock = LockFile::try_acquire(temp_dir.join("lock"), mode.lock_kind())?;

        let mut tx = Self {
            path,
            temp_dir,
            temp_path,
            mode,
            lock: Some(lock),
            finished: false,
            publish: PublishOptions::default(),
        };

        if mode.writes() {
            // Leftover from an aborted run; safe to drop now that we hold the lock.
            discard(&tx.temp_path)?;
            if mode.seeds_from_final() && fs::symlink_metadata(&tx.path).is_ok() {
                seed(&tx.path, &tx.temp_path)?;
            }
        }

        tracing::debug!(path = %tx.path.display(), ?mode, "transaction opened");
        Ok(tx)
    }

    #[must_use]
    pub fn with_publish_options(mut self, options: PublishOptions) -> Self {
        self.publish = options;
        self
    }

    /// The final path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the caller should read or write: the staged path for writers,
    /// the final path for readers.
    pub fn safe_path(&self) -> &Path {
        if self.mode.writes() {
            &self.temp_path
        } else {
            &self.path
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Opens [`safe_path`](Self::safe_path) as a file with options matching the mode.
    pub fn open(&self) -> Result<File> {
        let path = self.safe_path();
        let mut options = File::options();
        match self.mode {
            AccessMode::Read => options.read(true),
            AccessMode::Write => options.write(true).create(true).truncate(true),
            AccessMode::ReadWrite => options.read(true).write(true).create(true),
            AccessMode::Append => options.append(true).create(true),
        };
        options.open(path).map_err(|e| {
            if self.mode.writes() {
                Error::Write {
                    path: path.to_path_buf(),
                    source: e,
                }
            } else {
                Error::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })
    }

    /// Publishes the staged entry, if the caller produced one, and releases.
    pub fn commit(mut self) -> Result<()> {
        self.finish(true)
    }

    /// Releases without touching the final path.
    pub fn abort(mut self) -> Result<()> {
        self.finish(false)
    }

    fn finish(&mut self, success: bool) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let staged = self.mode.writes() && fs::symlink_metadata(&self.temp_path).is_ok();
        let published = if success && staged {
            publish(&self.temp_path, &self.path, self.publish)
        } else {
            Ok(())
        };

        match &published {
            Ok(()) if success && staged => {
                tracing::debug!(path = %self.path.display(), "transaction published")
            }
            Ok(()) => tracing::trace!(path = %self.path.display(), success, "transaction closed"),
            Err(err) => tracing::warn!(path = %self.path.display(), %err, "publish failed"),
        }

        self.release();
        published
    }

    fn release(&mut self) {
        let Some(mut lock) = self.lock.take() else {
            return;
        };

        // Only the last holder removes the staging directory; a reader that
        // cannot upgrade leaves it to whoever still holds a lock.
        if lock.try_upgrade() {
            if let Err(err) = fs::remove_dir_all(&self.temp_dir) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.temp_dir.display(), %err, "staging cleanup failed");
                }
            }
        }
        drop(lock);
    }
}

impl Drop for FileTransaction {
    fn drop(&mut self) {
        let _ = self.finish(false);
    }
}

/// `X` -> `X.tmp` next to it.
pub fn staging_dir(path: &Path, file_name: &OsString) -> PathBuf {
    let mut name = file_name.clone();
    name.push(".tmp");
    path.with_file_name(name)
}
