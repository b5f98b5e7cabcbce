use crate::error::{BoxError, TransformError};
use freshen_policy::{StatusRecord, StatusSender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;

/// How a transform receives its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Open file handles on the staged outputs.
    File,
    #[default]
    Path,
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Outputs start empty.
    #[default]
    Write,
    /// Outputs start as a copy of the existing destination.
    Append,
}

impl WriteMode {
    pub fn access(self) -> freshen_fs::AccessMode {
        match self {
            Self::Write => freshen_fs::AccessMode::Write,
            Self::Append => freshen_fs::AccessMode::Append,
        }
    }
}

/// Staged outputs in the shape the artifact was configured for.
#[derive(Debug)]
pub enum Outputs {
    Files(Vec<File>),
    Paths(Vec<PathBuf>),
    Strs(Vec<String>),
}

impl Outputs {
    pub fn len(&self) -> usize {
        match self {
            Self::Files(v) => v.len(),
            Self::Paths(v) => v.len(),
            Self::Strs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a transform gets to see while it runs.
pub struct TransformContext<'a> {
    srcs: &'a [PathBuf],
    dsts: &'a [PathBuf],
    staged: Vec<PathBuf>,
    outputs: Outputs,
    mode: WriteMode,
    status: &'a StatusSender,
}

impl<'a> TransformContext<'a> {
    pub(crate) fn new(
        srcs: &'a [PathBuf],
        dsts: &'a [PathBuf],
        staged: Vec<PathBuf>,
        outputs: Outputs,
        mode: WriteMode,
        status: &'a StatusSender,
    ) -> Self {
        Self {
            srcs,
            dsts,
            staged,
            outputs,
            mode,
            status,
        }
    }

    pub fn srcs(&self) -> &[PathBuf] {
        self.srcs
    }

    /// Final destination paths. Writes should go to [`outputs`](Self::outputs).
    pub fn dsts(&self) -> &[PathBuf] {
        self.dsts
    }

    /// Staged paths, regardless of how outputs are presented.
    pub fn staged(&self) -> &[PathBuf] {
        &self.staged
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn outputs(&mut self) -> &mut Outputs {
        &mut self.outputs
    }

    /// Forwards a progress record from inside the transform.
    pub fn emit(&self, record: StatusRecord) {
        self.status.blocking_send(record);
    }

    /// Writes to output `index` through whichever handle kind was configured.
    pub fn with_output<F>(&mut self, index: usize, write: F) -> std::io::Result<()>
    where
        F: FnOnce(&mut dyn std::io::Write) -> std::io::Result<()>,
    {
        match &mut self.outputs {
            Outputs::Files(files) => match files.get_mut(index) {
                Some(file) => write(file),
                None => Err(missing_output(index)),
            },
            Outputs::Paths(_) | Outputs::Strs(_) => {
                let path = self.staged.get(index).ok_or_else(|| missing_output(index))?;
                let mut file = match self.mode {
                    WriteMode::Write => File::create(path)?,
                    WriteMode::Append => File::options().append(true).create(true).open(path)?,
                };
                write(&mut file)
            }
        }
    }
}

fn missing_output(index: usize) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, format!("no output #{index}"))
}

/// Portable description of a registered transform: a name plus string
/// arguments. This is what crosses the worker process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl TransformSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Produces staged outputs from sources.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<(), TransformError>;

    /// `None` for transforms that only exist in this process.
    fn spec(&self) -> Option<TransformSpec> {
        None
    }
}

/// An in-process closure used as a transform.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&mut TransformContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<(), TransformError> {
        (self.f)(ctx).map_err(|e| TransformError::failed(&self.name, e))
    }
}

pub fn transform_fn<F>(name: impl Into<String>, f: F) -> FnTransform<F>
where
    F: Fn(&mut TransformContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    FnTransform {
        name: name.into(),
        f,
    }
}
