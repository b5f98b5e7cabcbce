use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use freshen_fs::{LockFile, LockKind, PublishOptions};
use freshen_verify::{BLOCK_SIZE, DigestAlgorithm, ExpectedDigest, Hasher, StreamHasher};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::data::{ResumeFallback, Throughput};
use crate::error::{FetchError, Result};

/// `X.download`, `X.lock` and `X.checksum` for destination `X`.
#[derive(Debug, Clone)]
pub struct Sidecars {
    pub partial: PathBuf,
    pub lock: PathBuf,
    pub marker: PathBuf,
}

impl Sidecars {
    pub fn of(dst: &Path) -> Result<Self> {
        let name = dst.file_name().ok_or_else(|| freshen_fs::Error::InvalidPath {
            path: dst.to_path_buf(),
        })?;
        let with = |suffix: &str| {
            let mut sidecar = OsString::from(name);
            sidecar.push(".");
            sidecar.push(suffix);
            dst.with_file_name(sidecar)
        };
        Ok(Self {
            partial: with("download"),
            lock: with("lock"),
            marker: with("checksum"),
        })
    }
}

/// An in-progress download into `X.download`, exclusively locked through
/// `X.lock`.
///
/// `X.checksum` records the expected digest the partial bytes were fetched
/// against; a later attempt resumes only if it expects the same digest.
/// Dropping without [`finish`](Self::finish) releases the lock and leaves
/// the partial file and marker for the next attempt.
pub struct PartialTransfer {
    dst: PathBuf,
    sidecars: Sidecars,
    lock: LockFile,
    file: File,
    algorithm: Option<DigestAlgorithm>,
    hasher: Option<StreamHasher>,
    offset: u64,
    write: Throughput,
}

impl PartialTransfer {
    pub async fn begin(dst: &Path, digest: Option<&ExpectedDigest>, fallback: ResumeFallback) -> Result<Self> {
        let sidecars = Sidecars::of(dst)?;
        let lock = LockFile::try_acquire(&sidecars.lock, LockKind::Exclusive)?;

        let marker = match fs::read_to_string(&sidecars.marker).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(FetchError::io(&sidecars.marker, e)),
        };
        let exists = fs::try_exists(&sidecars.partial)
            .await
            .map_err(|e| FetchError::io(&sidecars.partial, e))?;

        let resume = exists
            && match digest {
                Some(digest) => marker.as_deref().is_some_and(|m| digest.matches(m)),
                None => fallback == ResumeFallback::Continue,
            };

        let (file, offset, hasher) = if resume {
            let file = OpenOptions::new()
                .append(true)
                .open(&sidecars.partial)
                .await
                .map_err(|e| FetchError::io(&sidecars.partial, e))?;
            let offset = file
                .metadata()
                .await
                .map_err(|e| FetchError::io(&sidecars.partial, e))?
                .len();
            let hasher = match digest {
                Some(digest) => Some(rehash(sidecars.partial.clone(), digest).await?),
                None => None,
            };
            tracing::info!(path = %dst.display(), offset, "resuming partial download");
            (file, offset, hasher)
        } else {
            if exists {
                tracing::debug!(path = %sidecars.partial.display(), "discarding partial download");
            }
            let file = File::create(&sidecars.partial)
                .await
                .map_err(|e| FetchError::io(&sidecars.partial, e))?;
            (file, 0, digest.map(|d| StreamHasher::new(d.algorithm)))
        };

        match digest {
            Some(digest) => fs::write(&sidecars.marker, &digest.hex)
                .await
                .map_err(|e| FetchError::io(&sidecars.marker, e))?,
            None => remove_if_exists(&sidecars.marker).await?,
        }

        Ok(Self {
            dst: dst.to_path_buf(),
            sidecars,
            lock,
            file,
            algorithm: digest.map(|d| d.algorithm),
            hasher,
            offset,
            write: Throughput::new(),
        })
    }

    /// Bytes already on disk.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Smoothed local write speed in bytes/s.
    pub fn write_speed(&self) -> f64 {
        self.write.speed()
    }

    pub fn sidecars(&self) -> &Sidecars {
        &self.sidecars
    }

    pub async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| FetchError::io(&self.sidecars.partial, e))?;
        if let Some(hasher) = &mut self.hasher {
            hasher.update(chunk);
        }
        self.offset += chunk.len() as u64;
        self.write.record(chunk.len());
        Ok(())
    }

    /// Drops the bytes written so far and starts over from byte 0. The lock
    /// and marker are kept.
    pub async fn restart(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| FetchError::io(&self.sidecars.partial, e))?;
        self.file
            .set_len(0)
            .await
            .map_err(|e| FetchError::io(&self.sidecars.partial, e))?;
        self.hasher = self.algorithm.map(StreamHasher::new);
        self.offset = 0;
        Ok(())
    }

    /// Publishes `X.download` as `X`, removes the sidecars, and returns
    /// the hex digest of everything written when a digest was expected.
    pub async fn finish(self) -> Result<Option<String>> {
        let Self {
            dst,
            sidecars,
            lock,
            mut file,
            hasher,
            ..
        } = self;

        file.flush().await.map_err(|e| FetchError::io(&sidecars.partial, e))?;
        file.sync_all().await.map_err(|e| FetchError::io(&sidecars.partial, e))?;
        drop(file);

        freshen_fs::publish(&sidecars.partial, &dst, PublishOptions::default())?;
        remove_if_exists(&sidecars.marker).await?;
        remove_if_exists(&sidecars.lock).await?;
        drop(lock);
        tracing::debug!(path = %dst.display(), "download published");

        Ok(hasher.map(StreamHasher::finalize_hex))
    }
}

async fn rehash(path: PathBuf, digest: &ExpectedDigest) -> Result<StreamHasher> {
    let algorithm = digest.algorithm;
    tokio::task::spawn_blocking(move || {
        let mut hasher = StreamHasher::new(algorithm);
        let mut reader = std::fs::File::open(&path).map_err(|e| FetchError::io(&path, e))?;
        let mut buf = vec![0u8; BLOCK_SIZE];
        loop {
            let n = reader.read(&mut buf).map_err(|e| FetchError::io(&path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher)
    })
    .await
    .map_err(|e| FetchError::Join(e.to_string()))?
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FetchError::io(path, e)),
    }
}
