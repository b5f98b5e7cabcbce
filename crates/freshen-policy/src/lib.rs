//! Idempotency policies and the status protocol.
//!
//! [`decide`] answers one question for an artifact whose destinations may
//! already exist: regenerate, or trust what is on disk. Producers report
//! progress and outcome as [`StatusRecord`]s over a bounded
//! [`StatusSender`].

mod channel;
mod decide;
mod error;
mod policy;
mod spec;
mod status;

pub use channel::{StatusReceiver, StatusSender, channel};
pub use decide::{Decision, Existence, Expected, decide, decide_with};
pub use error::{Classify, ErrorKind, PolicyError, Result};
pub use policy::{IdempotencyPolicy, ParsePolicyError};
pub use spec::{ArtifactSpec, latest_mtime};
pub use status::{ChecksumOutcome, Status, StatusRecord};

pub use freshen_verify::{DigestAlgorithm, ExpectedDigest, ExpectedDigests};
