use crate::VerifyError;
use crate::hasher::StreamHasher;
use std::fmt;
use std::str::FromStr;

/// Supported digest algorithms, declared in checking priority: when several
/// digests are known for one artifact, the earliest variant is the one
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Sha224,
    Sha384,
    Sha3_256,
    Sha3_512,
    #[cfg(feature = "blake3")]
    Blake3,
}

impl DigestAlgorithm {
    pub const ALL: &'static [DigestAlgorithm] = &[
        Self::Md5,
        Self::Sha1,
        Self::Sha256,
        Self::Sha512,
        Self::Sha224,
        Self::Sha384,
        Self::Sha3_256,
        Self::Sha3_512,
        #[cfg(feature = "blake3")]
        Self::Blake3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_512 => "sha3-512",
            #[cfg(feature = "blake3")]
            Self::Blake3 => "blake3",
        }
    }

    /// Position in the priority order; lower is checked first.
    pub fn rank(self) -> usize {
        Self::ALL.iter().position(|a| *a == self).unwrap_or(usize::MAX)
    }

    /// Rank of an algorithm given by name. Unknown names sort last.
    pub fn rank_of(name: &str) -> usize {
        name.parse::<Self>().map(Self::rank).unwrap_or(usize::MAX)
    }

    pub fn hasher(self) -> StreamHasher {
        StreamHasher::new(self)
    }
}

impl FromStr for DigestAlgorithm {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let algorithm = match normalized.as_str() {
            "md5" => Self::Md5,
            "sha1" => Self::Sha1,
            "sha224" => Self::Sha224,
            "sha256" => Self::Sha256,
            "sha384" => Self::Sha384,
            "sha512" => Self::Sha512,
            "sha3256" => Self::Sha3_256,
            "sha3512" => Self::Sha3_512,
            #[cfg(feature = "blake3")]
            "blake3" => Self::Blake3,
            _ => return Err(VerifyError::UnsupportedAlgorithm(s.to_string())),
        };
        Ok(algorithm)
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = VerifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(value: DigestAlgorithm) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
