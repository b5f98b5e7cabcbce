use crate::{DigestAlgorithm, Result, VerifyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Expected digests for one artifact, keyed by algorithm name and kept in
/// priority order. Only the first entry is ever checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ExpectedDigests {
    entries: Vec<(String, String)>,
}

/// The one digest that is actually verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl ExpectedDigests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, algorithm: impl Into<String>, hex: impl Into<String>) {
        let algorithm = algorithm.into();
        self.entries.retain(|(name, _)| !name.eq_ignore_ascii_case(&algorithm));
        self.entries.push((algorithm, hex.into()));
        self.entries.sort_by(|(a, _), (b, _)| {
            DigestAlgorithm::rank_of(a)
                .cmp(&DigestAlgorithm::rank_of(b))
                .then_with(|| a.cmp(b))
        });
    }

    #[must_use]
    pub fn with(mut self, algorithm: impl Into<String>, hex: impl Into<String>) -> Self {
        self.insert(algorithm, hex);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, h)| (a.as_str(), h.as_str()))
    }

    /// The highest-priority entry, resolved to a supported algorithm.
    ///
    /// `Ok(None)` when no digest is expected; an error when the first entry
    /// names an algorithm this build cannot compute.
    pub fn primary(&self) -> Result<Option<ExpectedDigest>> {
        let Some((name, hex)) = self.entries.first() else {
            return Ok(None);
        };
        let algorithm = name
            .parse()
            .map_err(|_| VerifyError::UnsupportedAlgorithm(name.clone()))?;
        Ok(Some(ExpectedDigest {
            algorithm,
            hex: hex.clone(),
        }))
    }
}

impl ExpectedDigest {
    pub fn new(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into(),
        }
    }

    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.trim().eq_ignore_ascii_case(actual_hex.trim())
    }

    pub fn verify(&self, actual_hex: &str) -> Result<()> {
        if self.matches(actual_hex) {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                algorithm: self.algorithm,
                expected: self.hex.clone(),
                actual: actual_hex.to_string(),
            })
        }
    }
}

impl From<BTreeMap<String, String>> for ExpectedDigests {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter()
            .fold(Self::new(), |digests, (algorithm, hex)| digests.with(algorithm, hex))
    }
}

impl From<ExpectedDigests> for BTreeMap<String, String> {
    fn from(digests: ExpectedDigests) -> Self {
        digests.entries.into_iter().collect()
    }
}

impl From<ExpectedDigest> for ExpectedDigests {
    fn from(digest: ExpectedDigest) -> Self {
        Self::new().with(digest.algorithm.name(), digest.hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_follows_priority() {
        let digests = ExpectedDigests::new()
            .with("sha512", "bb")
            .with("md5", "aa")
            .with("sha256", "cc");
        let primary = digests.primary().unwrap().unwrap();
        assert_eq!(primary.algorithm, DigestAlgorithm::Md5);
        assert_eq!(primary.hex, "aa");
    }

    #[test]
    fn test_unknown_algorithms_sort_last() {
        let digests = ExpectedDigests::new().with("crc32", "00").with("sha1", "11");
        assert_eq!(digests.iter().next(), Some(("sha1", "11")));

        let only_unknown = ExpectedDigests::new().with("crc32", "00");
        assert!(matches!(
            only_unknown.primary(),
            Err(VerifyError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_hex_compare_ignores_case() {
        let expected = ExpectedDigest::new(DigestAlgorithm::Sha256, "DEADBEEF");
        assert!(expected.matches("deadbeef"));
        assert!(expected.verify("deadbeee").is_err());
    }

    #[test]
    fn test_deserialize_from_map() {
        let digests: ExpectedDigests =
            serde_json::from_str(r#"{"sha256": "ab", "md5": "cd"}"#).unwrap();
        assert_eq!(digests.primary().unwrap().unwrap().algorithm, DigestAlgorithm::Md5);
    }
}
