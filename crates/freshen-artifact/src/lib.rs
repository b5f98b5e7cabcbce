//! Local artifact production.
//!
//! An [`Artifact`] runs a [`Transform`] over read-locked sources into staged
//! destinations, publishes them only when the transform succeeds, verifies
//! digests, and stamps modification times so that later runs can tell the
//! outputs are current.

mod artifact;
mod builtin;
mod error;
mod registry;
mod transform;

pub use artifact::{Artifact, ArtifactDescriptor};
pub use builtin::{CopyFile, Gunzip, Unlink, WriteText};
pub use error::{ArtifactError, BoxError, Result, TransformError};
pub use registry::TransformRegistry;
pub use transform::{
    FnTransform, InputKind, Outputs, Transform, TransformContext, TransformSpec, WriteMode, transform_fn,
};
