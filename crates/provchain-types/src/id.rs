use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Implements the shared 32-byte identifier surface: hex encoding, null
/// sentinel, conversions, and compact `Debug`/`Display` formatting.
macro_rules! hash_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create an identifier from a pre-computed hash.
            pub fn from_hash(hash: [u8; 32]) -> Self {
                Self(hash)
            }

            /// The null identifier (all zeros). Represents "no value".
            pub const fn null() -> Self {
                Self([0u8; 32])
            }

            /// Returns `true` if this is the null identifier.
            pub fn is_null(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// The raw 32-byte hash.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Hex-encoded string representation.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short hex representation (first 8 characters).
            pub fn short_hex(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                if bytes.len() != 32 {
                    return Err(TypeError::InvalidLength {
                        expected: 32,
                        actual: bytes.len(),
                    });
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

hash_id!(
    Cid,
    "Content identifier for a stored payload.\n\nA `Cid` is the domain-separated BLAKE3 hash of payload bytes. Identical content always produces the same `Cid`, making payloads deduplicatable and verifiable against external storage."
);

hash_id!(
    NodeId,
    "Identifier for a provenance node.\n\nDerived from the node's payload plus a per-creation nonce, so two nodes carrying identical payloads remain distinct without a central counter."
);

hash_id!(
    EdgeId,
    "Identifier for a transformation edge.\n\nDerived from `(source, target, relationship)` plus a UUID v7 disambiguator, so repeated edges between the same pair with the same relationship stay distinguishable."
);

impl Cid {
    /// Compute the content identifier for a payload.
    pub fn of(payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"provchain-payload-v1:");
        hasher.update(payload);
        Self(*hasher.finalize().as_bytes())
    }
}

impl NodeId {
    /// Derive a node identifier from payload content and a creation nonce.
    pub fn derive(payload: &[u8], nonce: &[u8; 16]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"provchain-node-v1:");
        hasher.update(payload);
        hasher.update(nonce);
        Self(*hasher.finalize().as_bytes())
    }

    /// Derive a node identifier with a freshly generated random nonce.
    pub fn fresh(payload: &[u8]) -> Self {
        let nonce: [u8; 16] = rand::random();
        Self::derive(payload, &nonce)
    }
}

impl EdgeId {
    /// Derive an edge identifier from its endpoints, relationship, and an
    /// explicit disambiguator.
    pub fn derive(source: &NodeId, target: &NodeId, relationship: &str, disambiguator: Uuid) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"provchain-edge-v1:");
        hasher.update(source.as_bytes());
        hasher.update(target.as_bytes());
        hasher.update(relationship.as_bytes());
        hasher.update(disambiguator.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Derive an edge identifier with a fresh UUID v7 disambiguator.
    pub fn fresh(source: &NodeId, target: &NodeId, relationship: &str) -> Self {
        Self::derive(source, target, relationship, Uuid::now_v7())
    }
}
