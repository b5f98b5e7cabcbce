use crate::{Error, Result};
use chrono::{DateTime, SubsecRound, Utc};
use std::fs::{self, File, FileTimes};
use std::path::Path;
use std::time::SystemTime;

/// Normalizes a timestamp for comparison: UTC, microsecond precision.
pub fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time).trunc_subsecs(6)
}

pub fn system_time_from_utc(time: DateTime<Utc>) -> SystemTime {
    SystemTime::from(time)
}

pub fn modified_utc(path: &Path) -> Result<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(to_utc)
        .map_err(|e| Error::Read {
            path: path.to_path_buf(),
            source: e,
        })
}

pub fn set_times(path: &Path, accessed: SystemTime, modified: SystemTime) -> Result<()> {
    let times = FileTimes::new()
        .set_accessed(accessed)
        .set_modified(modified);

    let file = File::options()
        .write(!path.is_dir())
        .read(true)
        .open(path)
        .map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

    file.set_times(times).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
