use crate::hasher::Hasher;
use crate::{DigestAlgorithm, Result, VerifyError};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

pub const BLOCK_SIZE: usize = 64 * 1024;

/// Hex digest of everything `reader` yields.
pub fn digest_reader<R: Read>(mut reader: R, algorithm: DigestAlgorithm) -> Result<String> {
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

pub fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let file = File::open(path).map_err(|e| VerifyError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    digest_reader(file, algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_digest_file_spans_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big");
        let data = vec![7u8; BLOCK_SIZE * 2 + 11];
        std::fs::write(&path, &data).unwrap();

        let from_file = digest_file(&path, DigestAlgorithm::Sha256).unwrap();
        let from_slice = digest_reader(&data[..], DigestAlgorithm::Sha256).unwrap();
        assert_eq!(from_file, from_slice);
    }

    #[test]
    fn test_digest_missing_file() {
        let dir = tempdir().unwrap();
        let err = digest_file(&dir.path().join("nope"), DigestAlgorithm::Md5).unwrap_err();
        assert!(matches!(err, VerifyError::Read { .. }));
    }
}
