use crate::error::TransformError;
use crate::transform::{Transform, TransformContext, TransformSpec};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Copies the source onto each output (one source), or source `i` onto
/// output `i`.
#[derive(Debug, Default)]
pub struct CopyFile;

impl Transform for CopyFile {
    fn name(&self) -> &str {
        "copy"
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<(), TransformError> {
        let pairs = pair_sources(self.name(), ctx)?;
        for (index, src) in pairs {
            if src.is_dir() {
                let staged = ctx.staged()[index].clone();
                freshen_fs::primitives::copy_dir_all(&src, &staged)
                    .map_err(|e| TransformError::failed(self.name(), e))?;
                continue;
            }
            let mut input = File::open(&src).map_err(|e| TransformError::failed(self.name(), e))?;
            ctx.with_output(index, |out| io::copy(&mut input, out).map(|_| ()))
                .map_err(|e| TransformError::failed(self.name(), e))?;
        }
        Ok(())
    }

    fn spec(&self) -> Option<TransformSpec> {
        Some(TransformSpec::new(self.name()))
    }
}

/// Writes fixed text to every output.
#[derive(Debug)]
pub struct WriteText {
    text: String,
}

impl WriteText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Transform for WriteText {
    fn name(&self) -> &str {
        "write"
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<(), TransformError> {
        for index in 0..ctx.staged().len() {
            ctx.with_output(index, |out| out.write_all(self.text.as_bytes()))
                .map_err(|e| TransformError::failed(self.name(), e))?;
        }
        Ok(())
    }

    fn spec(&self) -> Option<TransformSpec> {
        Some(TransformSpec::new(self.name()).arg("text", &self.text))
    }
}

/// Decompresses a gzip source.
#[derive(Debug, Default)]
pub struct Gunzip;

impl Transform for Gunzip {
    fn name(&self) -> &str {
        "gunzip"
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<(), TransformError> {
        let pairs = pair_sources(self.name(), ctx)?;
        for (index, src) in pairs {
            let input = File::open(&src).map_err(|e| TransformError::failed(self.name(), e))?;
            let mut decoder = GzDecoder::new(input);
            ctx.with_output(index, |out| io::copy(&mut decoder, out).map(|_| ()))
                .map_err(|e| TransformError::failed(self.name(), e))?;
        }
        Ok(())
    }

    fn spec(&self) -> Option<TransformSpec> {
        Some(TransformSpec::new(self.name()))
    }
}

/// Removes the destinations. Usually run under `overwrite`.
#[derive(Debug, Default)]
pub struct Unlink;

impl Transform for Unlink {
    fn name(&self) -> &str {
        "unlink"
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<(), TransformError> {
        for dst in ctx.dsts() {
            remove(dst).map_err(|e| TransformError::failed(self.name(), e))?;
        }
        Ok(())
    }

    fn spec(&self) -> Option<TransformSpec> {
        Some(TransformSpec::new(self.name()))
    }
}

fn remove(path: &Path) -> io::Result<()> {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn pair_sources(
    name: &str,
    ctx: &TransformContext<'_>,
) -> Result<Vec<(usize, std::path::PathBuf)>, TransformError> {
    let srcs = ctx.srcs();
    let outputs = ctx.staged().len();
    match srcs.len() {
        1 => Ok((0..outputs).map(|i| (i, srcs[0].clone())).collect()),
        n if n == outputs && n > 0 => Ok(srcs.iter().cloned().enumerate().collect()),
        n => Err(TransformError::Arity {
            name: name.to_string(),
            srcs: n,
            dsts: outputs,
        }),
    }
}
