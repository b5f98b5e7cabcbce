use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// Copies `src` (file or directory tree) to `dest` so that a staged write can
/// start from the current contents.
pub fn seed(src: &Path, dest: &Path) -> Result<()> {
    let meta = fs::metadata(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;

    if meta.is_dir() {
        copy_dir_all(src, dest)
    } else {
        fs::copy(src, dest).map(|_| ()).map_err(|e| Error::Write {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}

pub fn copy_dir_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    fs::create_dir_all(dest).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let entries = fs::read_dir(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::Read {
            path: src.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type().map_err(|e| Error::Read {
            path: entry.path(),
            source: e,
        })?;

        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&src_path, &dest_path)?;
        } else if file_type.is_symlink() {
            copy_link(&src_path, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path).map_err(|e| Error::Write {
                path: dest_path,
                source: e,
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(src: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;
    std::os::unix::fs::symlink(target, dest).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

// Links are followed on platforms where creating one needs extra privileges.
#[cfg(not(unix))]
fn copy_link(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir_all(src, dest)
    } else {
        fs::copy(src, dest).map(|_| ()).map_err(|e| Error::Write {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}
