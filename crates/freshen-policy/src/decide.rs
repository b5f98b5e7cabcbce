use crate::{IdempotencyPolicy, PolicyError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use freshen_verify::{ExpectedDigests, digest_file};
use std::fs;
use std::path::{Path, PathBuf};

/// What the destinations are expected to look like.
#[derive(Debug, Clone, Copy)]
pub struct Expected<'a> {
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
    pub digests: &'a ExpectedDigests,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip,
}

impl Decision {
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Which destinations are present on disk (dangling links count).
#[derive(Debug, Clone)]
pub struct Existence {
    present: Vec<bool>,
}

impl Existence {
    pub fn of(dsts: &[PathBuf]) -> Self {
        Self {
            present: dsts
                .iter()
                .map(|dst| fs::symlink_metadata(dst).is_ok())
                .collect(),
        }
    }

    pub fn all(&self) -> bool {
        self.present.iter().all(|p| *p)
    }

    pub fn any(&self) -> bool {
        self.present.iter().any(|p| *p)
    }

    fn first_present<'a>(&self, dsts: &'a [PathBuf]) -> Option<&'a PathBuf> {
        dsts.iter().zip(&self.present).find(|(_, p)| **p).map(|(d, _)| d)
    }
}

/// Decides whether `dsts` must be (re)generated under `policy`.
///
/// Existence and comparisons are per destination: skipping needs every
/// destination present and matching, while a single missing or differing
/// destination forces regeneration of the whole group.
pub fn decide(policy: IdempotencyPolicy, dsts: &[PathBuf], expected: &Expected<'_>) -> Result<Decision> {
    let existence = Existence::of(dsts);
    decide_with(policy, dsts, &existence, expected)
}

/// [`decide`] with existence already sampled by the caller.
pub fn decide_with(
    policy: IdempotencyPolicy,
    dsts: &[PathBuf],
    existence: &Existence,
    expected: &Expected<'_>,
) -> Result<Decision> {
    let label = dsts.first().map(|p| p.display().to_string()).unwrap_or_default();

    match policy {
        IdempotencyPolicy::ErrorIfExists => {
            if let Some(path) = existence.first_present(dsts) {
                tracing::error!(path = %path.display(), "already exists");
                return Err(PolicyError::AlreadyExists { path: path.clone() });
            }
            Ok(Decision::Proceed)
        }
        IdempotencyPolicy::Skip => {
            if existence.all() {
                tracing::info!(path = %label, "already exists: skip");
                Ok(Decision::Skip)
            } else {
                Ok(Decision::Proceed)
            }
        }
        IdempotencyPolicy::Overwrite => {
            if existence.any() {
                tracing::info!(path = %label, "already exists: overwrite");
            }
            Ok(Decision::Proceed)
        }
        IdempotencyPolicy::DifferentContent => {
            if !existence.all() {
                tracing::info!(path = %label, "missing: processing");
                return Ok(Decision::Proceed);
            }
            if let Some(size) = expected.size {
                for dst in dsts {
                    if stat(dst)?.len() != size {
                        tracing::info!(path = %dst.display(), "size differs: reprocessing");
                        return Ok(Decision::Proceed);
                    }
                }
            }
            if let Some(digest) = expected.digests.primary()? {
                for dst in dsts {
                    let actual = digest_file(dst, digest.algorithm)?;
                    if !digest.matches(&actual) {
                        tracing::info!(path = %dst.display(), algorithm = %digest.algorithm, "digest differs: reprocessing");
                        return Ok(Decision::Proceed);
                    }
                }
            }
            tracing::info!(path = %label, "identical: skip");
            Ok(Decision::Skip)
        }
        IdempotencyPolicy::RefreshByTime => {
            if !existence.all() {
                tracing::info!(path = %label, "missing: processing");
                return Ok(Decision::Proceed);
            }
            let Some(mtime) = expected.mtime else {
                tracing::warn!(path = %label, "no mtime on record: reprocessing");
                return Ok(Decision::Proceed);
            };
            let mtime = mtime.trunc_subsecs(6);
            for dst in dsts {
                if modified(dst)? != mtime {
                    tracing::info!(path = %dst.display(), "mtime differs: reprocessing");
                    return Ok(Decision::Proceed);
                }
            }
            tracing::info!(path = %label, "up to date: skip");
            Ok(Decision::Skip)
        }
    }
}

fn stat(path: &Path) -> Result<fs::Metadata> {
    fs::metadata(path).map_err(|e| PolicyError::Stat {
        path: path.to_path_buf(),
        source: e,
    })
}

fn modified(path: &Path) -> Result<DateTime<Utc>> {
    let modified = stat(path)?.modified().map_err(|e| PolicyError::Stat {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(freshen_fs::to_utc(modified))
}
