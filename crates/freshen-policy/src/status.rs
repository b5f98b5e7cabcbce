use crate::ErrorKind;
use serde::{Deserialize, Serialize};

/// Terminal state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Skipped,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumOutcome {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "differs")]
    Differs,
    /// Nothing to check against.
    #[serde(rename = "-")]
    Unchecked,
}

/// One incremental update about one artifact.
///
/// Fields left `None` carry no information; consumers [`merge`] records
/// into a live view. The serialized field names are the wire format shared
/// with worker processes and renderers.
///
/// [`merge`]: StatusRecord::merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<u64>,
    #[serde(rename = "done%", default, skip_serializing_if = "Option::is_none")]
    pub done_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumOutcome>,
    /// Source read speed, bytes/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dspeed: Option<f64>,
    /// Local write speed, bytes/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wspeed: Option<f64>,
    /// End-to-end speed, bytes/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tspeed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
}

impl StatusRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: Some(Status::Skipped),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            status: Some(Status::Done),
            ..Self::default()
        }
    }

    /// Message format: `[Kind] detail`.
    pub fn error(kind: ErrorKind, message: impl std::fmt::Display) -> Self {
        Self {
            status: Some(Status::Error),
            message: Some(format!("[{kind}] {message}")),
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn checksum(outcome: ChecksumOutcome) -> Self {
        Self {
            checksum: Some(outcome),
            ..Self::default()
        }
    }

    /// Byte progress; `done%` is filled in when the total is known.
    pub fn progress(done: u64, size: Option<u64>) -> Self {
        Self {
            size,
            done: Some(done),
            done_pct: size.filter(|s| *s > 0).map(|s| 100.0 * done as f64 / s as f64),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_speeds(mut self, dspeed: f64, wspeed: f64, tspeed: f64) -> Self {
        self.dspeed = Some(dspeed);
        self.wspeed = Some(wspeed);
        self.tspeed = Some(tspeed);
        self
    }

    #[must_use]
    pub fn with_checksum(mut self, outcome: ChecksumOutcome) -> Self {
        self.checksum = Some(outcome);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(Status::Error)
    }

    /// Overlays every field set in `other`.
    pub fn merge(&mut self, other: &StatusRecord) {
        fn overlay<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }

        overlay(&mut self.path, &other.path);
        overlay(&mut self.size, &other.size);
        overlay(&mut self.done, &other.done);
        overlay(&mut self.done_pct, &other.done_pct);
        overlay(&mut self.checksum, &other.checksum);
        overlay(&mut self.dspeed, &other.dspeed);
        overlay(&mut self.wspeed, &other.wspeed);
        overlay(&mut self.tspeed, &other.tspeed);
        overlay(&mut self.status, &other.status);
        overlay(&mut self.message, &other.message);
        overlay(&mut self.kind, &other.kind);
        overlay(&mut self.errors, &other.errors);
        overlay(&mut self.skipped, &other.skipped);
    }
}
