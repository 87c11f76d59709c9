use serde::{Deserialize, Serialize};

use provchain_types::Cid;

use crate::hasher::ContentHasher;

/// Side of a sibling in a chunk inclusion proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Binary Merkle tree over fixed-size payload chunks.
///
/// A payload is split into `chunk_size` slices, each chunk is hashed under
/// the chunk domain, and the tree is built over those leaf hashes. The root
/// anchors a possession proof to the exact payload bytes; individual chunks
/// can be spot-checked with [`ChunkProof`]s.
///
/// An empty payload is treated as a single empty chunk, so every payload has
/// a non-null root.
#[derive(Clone, Debug)]
pub struct ChunkTree {
    root: Cid,
    chunk_size: usize,
    leaves: Vec<Cid>,
    /// All tree nodes, level by level. Level 0 = leaves, last = root.
    levels: Vec<Vec<Cid>>,
}

impl ChunkTree {
    /// Build a chunk tree over a payload.
    ///
    /// `chunk_size` must be non-zero; zero is clamped to one byte.
    pub fn build(payload: &[u8], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let leaves: Vec<Cid> = if payload.is_empty() {
            vec![ContentHasher::CHUNK.hash(&[])]
        } else {
            payload
                .chunks(chunk_size)
                .map(|chunk| ContentHasher::CHUNK.hash(chunk))
                .collect()
        };

        let mut levels: Vec<Vec<Cid>> = vec![leaves.clone()];
        let mut current = leaves.clone();

        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let hash = if pair.len() == 2 {
                    hash_pair(&pair[0], &pair[1])
                } else {
                    // Odd node: hash with itself
                    hash_pair(&pair[0], &pair[0])
                };
                next.push(hash);
            }
            levels.push(next.clone());
            current = next;
        }

        let root = current[0];
        Self {
            root,
            chunk_size,
            leaves,
            levels,
        }
    }

    /// The root hash of the tree.
    pub fn root(&self) -> Cid {
        self.root
    }

    /// The chunk size the tree was built with.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks (leaves).
    pub fn chunk_count(&self) -> usize {
        self.leaves.len()
    }

    /// Generate an inclusion proof for the chunk at `index`.
    pub fn proof(&self, index: usize) -> Option<ChunkProof> {
        if index >= self.leaves.len() || self.levels.is_empty() {
            return None;
        }

        let mut path = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let sibling = if sibling_idx < level.len() {
                level[sibling_idx]
            } else {
                // Odd level: duplicate the last element
                level[idx]
            };
            let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
            path.push((sibling, side));
            idx /= 2;
        }

        Some(ChunkProof {
            leaf: self.leaves[index],
            path,
            root: self.root,
        })
    }
}

/// Inclusion proof for a single payload chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProof {
    /// The chunk hash being proven.
    pub leaf: Cid,
    /// Path of (sibling_hash, sibling_side) pairs from leaf to root.
    pub path: Vec<(Cid, Side)>,
    /// Expected root hash.
    pub root: Cid,
}

impl ChunkProof {
    /// Verify the proof: recompute the root from the leaf and path.
    pub fn verify(&self) -> bool {
        let mut current = self.leaf;
        for (sibling, side) in &self.path {
            current = match side {
                Side::Left => hash_pair(sibling, &current),
                Side::Right => hash_pair(&current, sibling),
            };
        }
        current == self.root
    }

    /// Verify the proof against raw chunk bytes.
    pub fn verify_chunk(&self, chunk: &[u8]) -> bool {
        ContentHasher::CHUNK.hash(chunk) == self.leaf && self.verify()
    }
}

fn hash_pair(left: &Cid, right: &Cid) -> Cid {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"provchain-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Cid::from_hash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_has_non_null_root() {
        let tree = ChunkTree::build(&[], 4);
        assert!(!tree.root().is_null());
        assert_eq!(tree.chunk_count(), 1);
    }

    #[test]
    fn single_chunk_is_root() {
        let tree = ChunkTree::build(b"abc", 16);
        assert_eq!(tree.chunk_count(), 1);
        assert_eq!(tree.root(), ContentHasher::CHUNK.hash(b"abc"));
    }

    #[test]
    fn chunk_count_matches_payload() {
        let payload = vec![0u8; 100];
        let tree = ChunkTree::build(&payload, 32);
        assert_eq!(tree.chunk_count(), 4); // 32+32+32+4
    }

    #[test]
    fn deterministic_root() {
        let payload: Vec<u8> = (0..255).collect();
        assert_eq!(
            ChunkTree::build(&payload, 16).root(),
            ChunkTree::build(&payload, 16).root()
        );
    }

    #[test]
    fn root_changes_with_payload() {
        let a = ChunkTree::build(b"payload-a", 4);
        let b = ChunkTree::build(b"payload-b", 4);
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn root_changes_with_chunk_size() {
        let payload = vec![1u8; 64];
        assert_ne!(
            ChunkTree::build(&payload, 16).root(),
            ChunkTree::build(&payload, 32).root()
        );
    }

    #[test]
    fn proof_verifies_for_all_chunks() {
        let payload: Vec<u8> = (0..100).collect();
        let tree = ChunkTree::build(&payload, 16); // 7 chunks
        for i in 0..tree.chunk_count() {
            let proof = tree.proof(i).expect("proof should exist");
            assert!(proof.verify(), "proof for chunk {i} should verify");
        }
    }

    #[test]
    fn proof_out_of_bounds_returns_none() {
        let tree = ChunkTree::build(b"ab", 1);
        assert!(tree.proof(5).is_none());
    }

    #[test]
    fn tampered_proof_fails_verification() {
        let payload = vec![9u8; 64];
        let tree = ChunkTree::build(&payload, 16);
        let mut proof = tree.proof(0).unwrap();
        proof.leaf = ContentHasher::CHUNK.hash(b"tampered"); // tamper with the leaf
        assert!(!proof.verify());
    }

    #[test]
    fn verify_chunk_binds_to_bytes() {
        let payload = b"0123456789abcdef0123".to_vec();
        let tree = ChunkTree::build(&payload, 16);
        let proof = tree.proof(1).unwrap();
        assert!(proof.verify_chunk(&payload[16..]));
        assert!(!proof.verify_chunk(b"wrong bytes"));
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let tree = ChunkTree::build(b"abc", 0);
        assert_eq!(tree.chunk_size(), 1);
        assert_eq!(tree.chunk_count(), 3);
    }

    #[test]
    fn proof_serde_roundtrip() {
        let tree = ChunkTree::build(&vec![3u8; 48], 16);
        let proof = tree.proof(2).unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        let parsed: ChunkProof = serde_json::from_str(&json).unwrap();
        assert_eq!(proof, parsed);
        assert!(parsed.verify());
    }
}
