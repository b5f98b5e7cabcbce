use crate::DigestAlgorithm;
use digest::Digest;

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

/// Adapts any RustCrypto [`Digest`] to [`Hasher`].
#[derive(Clone, Default)]
pub struct DigestHasher<D: Digest + Send>(D);

impl<D: Digest + Send> DigestHasher<D> {
    pub fn new() -> Self {
        Self(D::new())
    }
}

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

pub struct Md5Hasher(md5::Context);

impl Default for Md5Hasher {
    fn default() -> Self {
        Self(md5::Context::new())
    }
}

impl Hasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.consume(data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.compute().0.to_vec()
    }
}

#[cfg(feature = "blake3")]
#[derive(Default)]
pub struct Blake3Hasher(blake3::Hasher);

#[cfg(feature = "blake3")]
impl Hasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}

/// A hasher for an algorithm chosen at runtime.
pub enum StreamHasher {
    Md5(Md5Hasher),
    Sha1(DigestHasher<sha1::Sha1>),
    Sha224(DigestHasher<sha2::Sha224>),
    Sha256(DigestHasher<sha2::Sha256>),
    Sha384(DigestHasher<sha2::Sha384>),
    Sha512(DigestHasher<sha2::Sha512>),
    Sha3_256(DigestHasher<sha3::Sha3_256>),
    Sha3_512(DigestHasher<sha3::Sha3_512>),
    #[cfg(feature = "blake3")]
    Blake3(Box<Blake3Hasher>),
}

impl StreamHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(Md5Hasher::default()),
            DigestAlgorithm::Sha1 => Self::Sha1(DigestHasher::new()),
            DigestAlgorithm::Sha224 => Self::Sha224(DigestHasher::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(DigestHasher::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(DigestHasher::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(DigestHasher::new()),
            DigestAlgorithm::Sha3_256 => Self::Sha3_256(DigestHasher::new()),
            DigestAlgorithm::Sha3_512 => Self::Sha3_512(DigestHasher::new()),
            #[cfg(feature = "blake3")]
            DigestAlgorithm::Blake3 => Self::Blake3(Box::default()),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        match self {
            Self::Md5(_) => DigestAlgorithm::Md5,
            Self::Sha1(_) => DigestAlgorithm::Sha1,
            Self::Sha224(_) => DigestAlgorithm::Sha224,
            Self::Sha256(_) => DigestAlgorithm::Sha256,
            Self::Sha384(_) => DigestAlgorithm::Sha384,
            Self::Sha512(_) => DigestAlgorithm::Sha512,
            Self::Sha3_256(_) => DigestAlgorithm::Sha3_256,
            Self::Sha3_512(_) => DigestAlgorithm::Sha3_512,
            #[cfg(feature = "blake3")]
            Self::Blake3(_) => DigestAlgorithm::Blake3,
        }
    }

    /// Lowercase hex of the final digest.
    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

impl Hasher for StreamHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Sha3_256(h) => h.update(data),
            Self::Sha3_512(h) => h.update(data),
            #[cfg(feature = "blake3")]
            Self::Blake3(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Md5(h) => h.finalize(),
            Self::Sha1(h) => h.finalize(),
            Self::Sha224(h) => h.finalize(),
            Self::Sha256(h) => h.finalize(),
            Self::Sha384(h) => h.finalize(),
            Self::Sha512(h) => h.finalize(),
            Self::Sha3_256(h) => h.finalize(),
            Self::Sha3_512(h) => h.finalize(),
            #[cfg(feature = "blake3")]
            Self::Blake3(h) => h.finalize(),
        }
    }
}

impl std::fmt::Debug for StreamHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamHasher").field(&self.algorithm()).finish()
    }
}
