use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            retry_count: 5,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Moves `staged` over `dest`, replacing whatever is there.
///
/// A plain rename handles file-over-file. When `dest` is a directory, or
/// `staged` is a directory and `dest` is a file, the old entry is removed
/// first and the rename retried.
pub fn publish(staged: &Path, dest: &Path, options: PublishOptions) -> Result<()> {
    let first = match fs::rename(staged, dest) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) if staged.is_dir() => {}
        _ => {
            return Err(Error::Publish {
                path: dest.to_path_buf(),
                source: first,
            });
        }
    }

    let mut attempts = 0;
    loop {
        let result = discard(dest).and_then(|()| {
            fs::rename(staged, dest).map_err(|e| Error::Publish {
                path: dest.to_path_buf(),
                source: e,
            })
        });

        match result {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempts += 1;
                if attempts >= options.retry_count.max(1) {
                    return Err(err);
                }
                tracing::debug!(path = %dest.display(), attempts, "publish retry");
                std::thread::sleep(options.retry_delay * attempts);
            }
        }
    }
}

/// Removes a file or directory tree. Missing paths are not an error.
pub fn discard(path: &Path) -> Result<()> {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Write {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
