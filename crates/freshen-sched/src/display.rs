use std::path::{Path, PathBuf};

use crate::config::PathDisplay;

/// Turns job destinations into the labels used in the progress feed.
#[derive(Debug, Clone)]
pub struct PathFormatter {
    mode: PathDisplay,
    root: Option<PathBuf>,
}

impl PathFormatter {
    /// A formatter for `mode`. [`PathDisplay::Short`] without a root, as
    /// built here, behaves like [`PathDisplay::Absolute`]; use
    /// [`short`](Self::short) instead.
    pub fn new(mode: PathDisplay) -> Self {
        Self { mode, root: None }
    }

    /// Strips the deepest directory shared by all `paths`.
    pub fn short<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let parents = paths
            .into_iter()
            .map(|path| absolute(path).parent().map(Path::to_path_buf).unwrap_or_default());
        Self {
            mode: PathDisplay::Short,
            root: common_ancestor(parents),
        }
    }

    pub fn mode(&self) -> PathDisplay {
        self.mode
    }

    pub fn format(&self, path: &Path) -> String {
        match self.mode {
            PathDisplay::Full => path.display().to_string(),
            PathDisplay::Absolute => absolute(path).display().to_string(),
            PathDisplay::Name => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            PathDisplay::Short => {
                let path = absolute(path);
                match &self.root {
                    Some(root) => path.strip_prefix(root).unwrap_or(&path).display().to_string(),
                    None => path.display().to_string(),
                }
            }
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn common_ancestor(paths: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    let mut paths = paths.into_iter();
    let mut common = paths.next()?;
    for path in paths {
        while !path.starts_with(&common) {
            if !common.pop() {
                return None;
            }
        }
    }
    Some(common)
}
