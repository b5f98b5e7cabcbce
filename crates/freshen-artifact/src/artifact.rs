use crate::error::{ArtifactError, Result, TransformError};
use crate::registry::TransformRegistry;
use crate::transform::{InputKind, Outputs, Transform, TransformContext, TransformSpec, WriteMode};
use freshen_fs::{AccessMode, FileGroup};
use freshen_policy::{
    ArtifactSpec, ChecksumOutcome, Classify, Decision, IdempotencyPolicy, StatusRecord, StatusSender,
    decide,
};
use freshen_verify::digest_file;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// One local production step: sources in, destinations out, guarded by an
/// idempotency policy.
#[derive(Clone)]
pub struct Artifact {
    spec: ArtifactSpec,
    policy: IdempotencyPolicy,
    transform: Arc<dyn Transform>,
    input: InputKind,
    mode: WriteMode,
}

/// Serializable form of an [`Artifact`] whose transform is registered by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    #[serde(flatten)]
    pub spec: ArtifactSpec,
    #[serde(default)]
    pub policy: IdempotencyPolicy,
    pub transform: TransformSpec,
    #[serde(default)]
    pub input: InputKind,
    #[serde(default)]
    pub mode: WriteMode,
}

impl Artifact {
    pub fn new(spec: ArtifactSpec, transform: Arc<dyn Transform>) -> Self {
        Self {
            spec,
            policy: IdempotencyPolicy::default(),
            transform,
            input: InputKind::default(),
            mode: WriteMode::default(),
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: IdempotencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn input(mut self, input: InputKind) -> Self {
        self.input = input;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn spec(&self) -> &ArtifactSpec {
        &self.spec
    }

    pub fn transform_name(&self) -> &str {
        self.transform.name()
    }

    pub fn from_descriptor(descriptor: ArtifactDescriptor, registry: &TransformRegistry) -> std::result::Result<Self, TransformError> {
        let transform = registry.build(&descriptor.transform)?;
        Ok(Self::new(descriptor.spec, transform)
            .policy(descriptor.policy)
            .input(descriptor.input)
            .mode(descriptor.mode))
    }

    /// The portable form, if the transform has one.
    pub fn descriptor(&self) -> std::result::Result<ArtifactDescriptor, TransformError> {
        let transform = self
            .transform
            .spec()
            .ok_or_else(|| TransformError::NotPortable(self.transform.name().to_string()))?;
        Ok(ArtifactDescriptor {
            spec: self.spec.clone(),
            policy: self.policy,
            transform,
            input: self.input,
            mode: self.mode,
        })
    }

    /// Runs to completion and returns the terminal record, which has also
    /// been sent on `status`. Failures never escape: they become an `error`
    /// record.
    ///
    /// Blocks; call from a blocking context.
    pub fn run(&self, policy_override: Option<IdempotencyPolicy>, status: &StatusSender) -> StatusRecord {
        let terminal = match self.produce(policy_override, status) {
            Ok(record) => record,
            Err(err) => {
                let label = self.label();
                tracing::error!(path = %label, %err, "artifact failed");
                StatusRecord::error(err.kind(), err)
            }
        };
        status.blocking_send(terminal.clone());
        terminal
    }

    fn label(&self) -> String {
        self.spec
            .primary_dst()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn produce(&self, policy_override: Option<IdempotencyPolicy>, status: &StatusSender) -> Result<StatusRecord> {
        let policy = IdempotencyPolicy::effective(policy_override, self.policy);
        let mtime = self.spec.effective_mtime();
        let dsts = &self.spec.dsts;

        // Sources stay read-locked until the artifact is finished.
        let present: Vec<&PathBuf> = self.spec.srcs.iter().filter(|src| src.exists()).collect();
        let _sources = FileGroup::begin(present, AccessMode::Read)?;

        let expected = freshen_policy::Expected {
            mtime,
            ..self.spec.expected()
        };
        if decide(policy, dsts, &expected)? == Decision::Skip {
            return Ok(StatusRecord::skipped("already exists"));
        }

        for dst in dsts {
            if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| freshen_fs::Error::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let outputs = FileGroup::begin(dsts.iter(), self.mode.access())?;
        let staged: Vec<PathBuf> = outputs.safe_paths().into_iter().map(PathBuf::from).collect();
        let handles = match self.input {
            InputKind::File => Outputs::Files(
                outputs
                    .iter()
                    .map(|tx| tx.open())
                    .collect::<freshen_fs::Result<Vec<_>>>()?,
            ),
            InputKind::Path => Outputs::Paths(staged.clone()),
            InputKind::Str => Outputs::Strs(staged.iter().map(|p| p.display().to_string()).collect()),
        };

        tracing::debug!(path = %self.label(), transform = self.transform.name(), "running transform");
        {
            let mut ctx = TransformContext::new(&self.spec.srcs, dsts, staged, handles, self.mode, status);
            self.transform.apply(&mut ctx)?;
        }
        outputs.commit()?;

        if let Some(digest) = self.spec.digests.primary()? {
            for dst in dsts {
                let actual = digest_file(dst, digest.algorithm)?;
                if !digest.matches(&actual) {
                    let message = format!(
                        "{}: output {actual} != {} for {}",
                        digest.algorithm,
                        digest.hex,
                        dst.display()
                    );
                    tracing::error!(path = %dst.display(), %message, "checksum differs");
                    return Ok(StatusRecord::error(freshen_policy::ErrorKind::ChecksumMismatch, message)
                        .with_checksum(ChecksumOutcome::Differs));
                }
                tracing::debug!(path = %dst.display(), algorithm = %digest.algorithm, "checksum verified");
            }
            status.blocking_send(StatusRecord::checksum(ChecksumOutcome::Ok));
        } else {
            status.blocking_send(StatusRecord::checksum(ChecksumOutcome::Unchecked));
        }

        let now = SystemTime::now();
        let modified = mtime.map(SystemTime::from).unwrap_or(now);
        for dst in dsts.iter().filter(|dst| dst.exists()) {
            freshen_fs::set_times(dst, now, modified)?;
        }

        Ok(StatusRecord::done())
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("spec", &self.spec)
            .field("policy", &self.policy)
            .field("transform", &self.transform.name())
            .field("input", &self.input)
            .field("mode", &self.mode)
            .finish()
    }
}
