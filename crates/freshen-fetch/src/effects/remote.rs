use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::OnceCell;
use url::Url;

use super::http::{Body, Headers, HttpClient, Method, Request, Response};
use super::session::Session;
use crate::core::{content_length, content_range_total, is_redirect, is_success, parse_http_date};
use crate::data::Throughput;
use crate::error::{FetchError, Result};

/// Size and modification time as advertised by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
}

impl RemoteMetadata {
    /// Reads a full (200) or partial (206) response. `offset` is where a
    /// partial body starts, used when the total is missing from
    /// `Content-Range`.
    pub fn from_headers(status: u16, headers: &Headers, offset: u64) -> Self {
        let length = headers.get("content-length").and_then(content_length);
        let size = if status == 206 {
            headers
                .get("content-range")
                .and_then(content_range_total)
                .or_else(|| length.map(|n| n + offset))
        } else {
            length
        };
        Self {
            size,
            mtime: headers.get("last-modified").and_then(parse_http_date),
        }
    }
}

/// One remote file behind a shared [`Session`].
///
/// Range support and metadata are probed at most once per source.
pub struct RemoteSource<C> {
    session: Arc<Session<C>>,
    url: Url,
    headers: Headers,
    max_redirects: u32,
    ranges: OnceCell<bool>,
    metadata: OnceCell<RemoteMetadata>,
}

impl<C: HttpClient> RemoteSource<C> {
    pub fn new(session: Arc<Session<C>>, url: Url) -> Self {
        Self {
            session,
            url,
            headers: Headers::new(),
            max_redirects: 20,
            ranges: OnceCell::new(),
            metadata: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the server honours `Range`, judged by a `bytes=0-0` HEAD
    /// answered with 206. Any failure counts as no.
    pub async fn supports_ranges(&self) -> bool {
        *self
            .ranges
            .get_or_init(|| async {
                let mut headers = self.headers.clone();
                headers.set("Range", "bytes=0-0");
                match self.request(Method::Head, &headers).await {
                    Ok(response) => {
                        tracing::debug!(url = %self.url, status = response.status, "range probe");
                        response.status == 206
                    }
                    Err(err) => {
                        tracing::debug!(url = %self.url, %err, "range probe failed");
                        false
                    }
                }
            })
            .await
    }

    /// Size and mtime from a HEAD request. Failures yield empty metadata.
    pub async fn metadata(&self) -> RemoteMetadata {
        *self
            .metadata
            .get_or_init(|| async {
                match self.request(Method::Head, &self.headers).await {
                    Ok(response) if is_success(response.status) => {
                        RemoteMetadata::from_headers(response.status, &response.headers, 0)
                    }
                    Ok(response) => {
                        tracing::debug!(url = %self.url, status = response.status, "no metadata");
                        RemoteMetadata::default()
                    }
                    Err(err) => {
                        tracing::debug!(url = %self.url, %err, "metadata request failed");
                        RemoteMetadata::default()
                    }
                }
            })
            .await
    }

    /// Opens the body at `offset`, with a ranged request when the server
    /// supports it and by discarding the first `offset` bytes otherwise.
    pub async fn open(&self, offset: u64) -> Result<RemoteStream> {
        let mut headers = self.headers.clone();
        let ranged = offset > 0 && self.supports_ranges().await;
        if ranged {
            headers.set("Range", format!("bytes={offset}-"));
        }

        let response = self.request(Method::Get, &headers).await?;
        if !is_success(response.status) {
            return Err(FetchError::Status {
                status: response.status,
                url: self.url.to_string(),
            });
        }

        let partial = response.status == 206;
        if ranged && !partial {
            tracing::debug!(url = %self.url, offset, "range ignored by server, skipping client-side");
        }
        let metadata = RemoteMetadata::from_headers(response.status, &response.headers, offset);
        let skip = if partial { 0 } else { offset };

        Ok(RemoteStream {
            url: self.url.to_string(),
            body: response.body,
            offset,
            skip,
            metadata,
            throughput: Throughput::new(),
        })
    }

    /// Sends one logical request: redirects are followed, and a refused
    /// request is retried once after re-authenticating.
    async fn request(&self, method: Method, headers: &Headers) -> Result<Response> {
        let response = self.follow(method, headers).await?;
        if is_success(response.status) || !self.session.can_authenticate() {
            return Ok(response);
        }
        tracing::debug!(url = %self.url, status = response.status, "re-authenticating");
        self.session.authenticate().await?;
        self.follow(method, headers).await
    }

    async fn follow(&self, method: Method, headers: &Headers) -> Result<Response> {
        let mut url = self.url.clone();
        for _ in 0..=self.max_redirects {
            let response = self
                .session
                .send(Request::new(method, url.clone()).headers(headers))
                .await?;
            if !is_redirect(response.status) {
                return Ok(response);
            }
            let location = response
                .headers
                .get("location")
                .ok_or_else(|| FetchError::MissingLocation(url.to_string()))?;
            let next = url.join(location).map_err(|e| FetchError::InvalidUrl {
                url: location.to_string(),
                reason: e.to_string(),
            })?;
            tracing::debug!(from = %url, to = %next, status = response.status, "following redirect");
            url = next;
        }
        Err(FetchError::TooManyRedirects(self.url.to_string()))
    }
}

/// An open response body positioned at the requested offset.
pub struct RemoteStream {
    url: String,
    body: Body,
    offset: u64,
    skip: u64,
    metadata: RemoteMetadata,
    throughput: Throughput,
}

impl RemoteStream {
    /// Total size of the remote file, when the response told us.
    pub fn size(&self) -> Option<u64> {
        self.metadata.size
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        self.metadata.mtime
    }

    /// Smoothed read speed in bytes/s.
    pub fn speed(&self) -> f64 {
        self.throughput.speed()
    }

    /// Keeps the bytes a full-body response would have skipped, so the
    /// stream yields the file from byte 0. False for a ranged response,
    /// whose body never held them.
    pub fn rewind(&mut self) -> bool {
        if self.skip == 0 || self.skip != self.offset {
            return false;
        }
        self.skip = 0;
        self.offset = 0;
        true
    }

    /// Next non-empty chunk. A full-body response that ends before the
    /// resume offset is an error, never an empty tail.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            let Some(chunk) = self.body.next().await.transpose()? else {
                if self.skip > 0 {
                    return Err(FetchError::EndedBeforeOffset {
                        url: self.url.clone(),
                        offset: self.offset,
                    });
                }
                return Ok(None);
            };
            self.throughput.record(chunk.len());
            let chunk = if self.skip > 0 {
                let n = self.skip.min(chunk.len() as u64);
                self.skip -= n;
                chunk.slice(n as usize..)
            } else {
                chunk
            };
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
    }
}
