use std::path::PathBuf;

use freshen_artifact::{Artifact, ArtifactDescriptor, TransformError, TransformRegistry};
use freshen_fetch::{FetchSpec, resolve_destination};
use freshen_policy::IdempotencyPolicy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::TransferSettings;

/// One unit of work in a batch.
#[derive(Debug, Clone)]
pub enum Job {
    Fetch(FetchSpec),
    Artifact(Artifact),
}

impl Job {
    /// The destination the job is reported under.
    pub fn target(&self) -> PathBuf {
        match self {
            Self::Fetch(spec) => match Url::parse(&spec.url) {
                Ok(url) => resolve_destination(&spec.dst, &url).unwrap_or_else(|_| spec.dst.clone()),
                Err(_) => spec.dst.clone(),
            },
            Self::Artifact(artifact) => artifact
                .spec()
                .primary_dst()
                .map(PathBuf::from)
                .unwrap_or_default(),
        }
    }

    /// Fails for artifacts whose transform is an in-process closure.
    pub fn descriptor(&self) -> Result<JobDescriptor, TransformError> {
        match self {
            Self::Fetch(spec) => Ok(JobDescriptor::Fetch(spec.clone())),
            Self::Artifact(artifact) => artifact.descriptor().map(JobDescriptor::Artifact),
        }
    }
}

impl From<FetchSpec> for Job {
    fn from(spec: FetchSpec) -> Self {
        Self::Fetch(spec)
    }
}

impl From<Artifact> for Job {
    fn from(artifact: Artifact) -> Self {
        Self::Artifact(artifact)
    }
}

/// Serializable form of a [`Job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "lowercase")]
pub enum JobDescriptor {
    Fetch(FetchSpec),
    Artifact(ArtifactDescriptor),
}

impl JobDescriptor {
    pub fn into_job(self, registry: &TransformRegistry) -> Result<Job, TransformError> {
        match self {
            Self::Fetch(spec) => Ok(Job::Fetch(spec)),
            Self::Artifact(descriptor) => Artifact::from_descriptor(descriptor, registry).map(Job::Artifact),
        }
    }
}

/// What a worker process reads on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub job: JobDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_override: Option<IdempotencyPolicy>,
    #[serde(default)]
    pub transfer: TransferSettings,
}
