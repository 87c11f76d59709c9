use provchain_types::Cid;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"provchain-proof-v1"`) that is
/// prepended to every hash computation. This prevents cross-type hash
/// collisions: a possession proof and a transformation binding over identical
/// bytes will produce different hashes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for payload chunks feeding the Merkle tree.
    pub const CHUNK: Self = Self {
        domain: "provchain-chunk-v1",
    };
    /// Hasher for possession-proof content hashes.
    pub const PROOF: Self = Self {
        domain: "provchain-proof-v1",
    };
    /// Hasher for transformation bindings on edges.
    pub const TRANSFORM: Self = Self {
        domain: "provchain-transform-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Cid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Cid::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a sequence of byte fields with length framing.
    ///
    /// Framing each field with its length prevents ambiguity between
    /// `("ab", "c")` and `("a", "bc")`.
    pub fn hash_fields(&self, fields: &[&[u8]]) -> Cid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Cid::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Cid, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected identifier.
    pub fn verify(&self, data: &[u8], expected: &Cid) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
