//! Digest algorithms and content verification.
//!
//! Artifacts may carry several expected digests; [`ExpectedDigests`] keeps
//! them in a fixed priority order and exposes the single one that is
//! checked. Hashing is incremental through the [`Hasher`] trait so that
//! digests can be computed while bytes stream to disk.
//!
//! ```
//! use freshen_verify::{DigestAlgorithm, ExpectedDigests, Hasher};
//!
//! let expected = ExpectedDigests::new()
//!     .with("sha256", "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
//! let primary = expected.primary().unwrap().unwrap();
//!
//! let mut hasher = DigestAlgorithm::Sha256.hasher();
//! hasher.update(b"hello world");
//! primary.verify(&hasher.finalize_hex()).unwrap();
//! ```

pub use self::algorithm::DigestAlgorithm;
pub use self::digests::{ExpectedDigest, ExpectedDigests};
pub use self::error::{Result, VerifyError};
pub use self::file::{BLOCK_SIZE, digest_file, digest_reader};
pub use self::hasher::{DigestHasher, Hasher, Md5Hasher, StreamHasher};

#[cfg(feature = "blake3")]
pub use self::hasher::Blake3Hasher;

mod algorithm;
mod digests;
mod error;
mod file;
mod hasher;
