use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use freshen_policy::{
    ChecksumOutcome, Classify, Decision, ErrorKind, Existence, Expected, IdempotencyPolicy, StatusRecord,
    StatusSender, decide_with,
};
use freshen_verify::ExpectedDigest;
use url::Url;

use super::http::{Headers, HttpClient};
use super::partial::PartialTransfer;
use super::remote::{RemoteMetadata, RemoteSource};
use super::session::Session;
use crate::core::{retry_delay, url_file_name};
use crate::data::{FetchOptions, FetchSpec};
use crate::error::{FetchError, Result};

/// Downloads one [`FetchSpec`] under an idempotency policy.
///
/// Deciding → (Skipped | Transferring → Verifying → (Done | checksum
/// error)) | Error. Every outcome, failures included, ends as one terminal
/// [`StatusRecord`].
///
/// Concurrent fetches of one destination exclude each other through the
/// `X.lock` sidecar held by [`PartialTransfer`]. That lock is not the
/// `X.tmp/lock` taken by `FileTransaction`, so a fetch and an artifact
/// build writing the same path are not serialized against each other.
pub struct Fetcher<C> {
    spec: FetchSpec,
    session: Arc<Session<C>>,
    options: FetchOptions,
}

struct Transferred {
    actual: Option<String>,
    mtime: Option<DateTime<Utc>>,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(spec: FetchSpec, session: Arc<Session<C>>) -> Self {
        Self {
            spec,
            session,
            options: FetchOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> &FetchSpec {
        &self.spec
    }

    /// Runs the fetch, sends its terminal record on `status`, and returns it.
    pub async fn run(&self, policy_override: Option<IdempotencyPolicy>, status: &StatusSender) -> StatusRecord {
        let terminal = match self.fetch(policy_override, status).await {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(url = %self.spec.url, %err, "fetch failed");
                StatusRecord::error(err.kind(), err)
            }
        };
        status.send(terminal.clone()).await;
        terminal
    }

    async fn fetch(&self, policy_override: Option<IdempotencyPolicy>, status: &StatusSender) -> Result<StatusRecord> {
        let url = parse_url(&self.spec.url)?;
        let dst = resolve_destination(&self.spec.dst, &url)?;
        let policy = IdempotencyPolicy::effective(policy_override, self.spec.policy);
        let digest = self.spec.digests.primary()?;
        let remote = RemoteSource::new(Arc::clone(&self.session), url)
            .with_headers(self.headers())
            .max_redirects(self.options.max_redirects);

        let dsts = vec![dst.clone()];
        let existence = Existence::of(&dsts);
        let advertised = if policy.compares_metadata() && existence.all() {
            remote.metadata().await
        } else {
            RemoteMetadata::default()
        };
        let size = self.spec.size.or(advertised.size);
        let mtime = self.spec.mtime.or(advertised.mtime);

        let digests = self.spec.digests.clone();
        let decision = tokio::task::spawn_blocking(move || {
            let expected = Expected {
                size,
                mtime,
                digests: &digests,
            };
            decide_with(policy, &dsts, &existence, &expected)
        })
        .await
        .map_err(|e| FetchError::Join(e.to_string()))??;
        if decision == Decision::Skip {
            return Ok(StatusRecord::skipped("already exists"));
        }

        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }
        if size.is_some() {
            status
                .send(StatusRecord {
                    size,
                    ..StatusRecord::default()
                })
                .await;
        }

        let mut attempt = 0;
        let transferred = loop {
            match self.transfer(&remote, &dst, digest.as_ref(), size, status).await {
                Ok(transferred) => break transferred,
                Err(err) if err.is_retryable() && attempt + 1 < self.options.max_attempts => {
                    let delay = retry_delay(attempt, self.options.retry_backoff);
                    attempt += 1;
                    tracing::warn!(url = %remote.url(), attempt, ?delay, %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        };

        if let Some(digest) = &digest {
            let actual = transferred.actual.unwrap_or_default();
            if !digest.matches(&actual) {
                let message = format!(
                    "{}: downloaded {actual} != {} for {}",
                    digest.algorithm,
                    digest.hex,
                    dst.display()
                );
                tracing::error!(path = %dst.display(), %message, "checksum differs");
                return Ok(StatusRecord::error(ErrorKind::ChecksumMismatch, message).with_checksum(ChecksumOutcome::Differs));
            }
            status.send(StatusRecord::checksum(ChecksumOutcome::Ok)).await;
        } else {
            status.send(StatusRecord::checksum(ChecksumOutcome::Unchecked)).await;
        }

        if let Some(mtime) = mtime.or(transferred.mtime) {
            freshen_fs::set_times(&dst, SystemTime::now(), mtime.into())?;
        }
        Ok(StatusRecord::done())
    }

    async fn transfer(
        &self,
        remote: &RemoteSource<C>,
        dst: &Path,
        digest: Option<&ExpectedDigest>,
        size: Option<u64>,
        status: &StatusSender,
    ) -> Result<Transferred> {
        let mut partial = PartialTransfer::begin(dst, digest, self.spec.if_no_digest).await?;
        let total = match size {
            None if partial.offset() > 0 => remote.metadata().await.size,
            size => size,
        };

        if total.is_some_and(|total| partial.offset() > total) {
            tracing::warn!(
                path = %dst.display(),
                offset = partial.offset(),
                ?total,
                "partial download is larger than the remote file, restarting"
            );
            partial.restart().await?;
        }

        // Some servers reject a range starting at the end of the file.
        let offset = partial.offset();
        if total == Some(offset) {
            tracing::info!(path = %dst.display(), offset, "partial download already complete");
            status.send(StatusRecord::progress(offset, total)).await;
            let actual = partial.finish().await?;
            return Ok(Transferred { actual, mtime: None });
        }

        let started = Instant::now();
        let mut stream = remote.open(offset).await?;
        let total = total.or(stream.size());
        let offset = if total.is_some_and(|total| offset > total) && stream.rewind() {
            tracing::warn!(
                path = %dst.display(),
                offset,
                ?total,
                "remote file is shorter than the partial download, restarting"
            );
            partial.restart().await?;
            0
        } else {
            offset
        };

        loop {
            let chunk = match stream.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err @ FetchError::EndedBeforeOffset { .. }) => {
                    partial.restart().await?;
                    return Err(err);
                }
                Err(err) => return Err(err),
            };
            partial.append(&chunk).await?;
            let done = partial.offset();
            let elapsed = started.elapsed().as_secs_f64();
            let tspeed = if elapsed > 0.0 { (done - offset) as f64 / elapsed } else { 0.0 };
            status
                .send(StatusRecord::progress(done, total).with_speeds(stream.speed(), partial.write_speed(), tspeed))
                .await;
        }

        let received = partial.offset();
        if let Some(expected) = total.filter(|&expected| expected != received) {
            // A short body is kept for the next attempt to resume.
            if received > expected {
                partial.restart().await?;
            }
            return Err(FetchError::SizeMismatch {
                url: remote.url().to_string(),
                received,
                expected,
            });
        }

        let mtime = stream.mtime();
        let actual = partial.finish().await?;
        Ok(Transferred { actual, mtime })
    }

    fn headers(&self) -> Headers {
        self.options
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(self.spec.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect()
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// `dst` itself, or `dst/<last URL segment>` when `dst` is an existing
/// directory.
pub fn resolve_destination(dst: &Path, url: &Url) -> Result<PathBuf> {
    if !dst.is_dir() {
        return Ok(dst.to_path_buf());
    }
    let name = url_file_name(url).ok_or_else(|| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: format!("no file name to place in directory '{}'", dst.display()),
    })?;
    Ok(dst.join(name))
}
