use crate::workflow::transaction::{AccessMode, FileTransaction};
use crate::Result;
use std::path::{Path, PathBuf};

/// Several transactions opened together.
///
/// Members are opened in the given order and closed in reverse. If any
/// member fails to open, the ones already opened are aborted.
#[derive(Debug, Default)]
pub struct FileGroup {
    members: Vec<FileTransaction>,
}

impl FileGroup {
    pub fn begin<I, P>(paths: I, mode: AccessMode) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut group = Self::default();
        for path in paths {
            group.members.push(FileTransaction::begin(path, mode)?);
        }
        Ok(group)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileTransaction> {
        self.members.iter()
    }

    pub fn safe_paths(&self) -> Vec<&Path> {
        self.members.iter().map(FileTransaction::safe_path).collect()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.members.iter().map(FileTransaction::path).collect()
    }

    /// Commits members in reverse order. After the first failure the rest
    /// are aborted and the failure is returned.
    pub fn commit(mut self) -> Result<()> {
        let mut outcome = Ok(());
        while let Some(tx) = self.members.pop() {
            if outcome.is_ok() {
                outcome = tx.commit();
            } else {
                let _ = tx.abort();
            }
        }
        outcome
    }

    pub fn abort(mut self) -> Result<()> {
        self.abort_all();
        Ok(())
    }

    fn abort_all(&mut self) {
        while let Some(tx) = self.members.pop() {
            let _ = tx.abort();
        }
    }
}

impl Drop for FileGroup {
    fn drop(&mut self) {
        self.abort_all();
    }
}
