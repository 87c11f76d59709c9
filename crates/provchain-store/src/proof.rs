use serde::{Deserialize, Serialize};

use provchain_crypto::{ChunkTree, ContentHasher};
use provchain_types::{Cid, Timestamp};

/// State of a storage deal as last reported by the external deal ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealState {
    /// Deal proposed, not yet sealed.
    Pending,
    /// Provider is actively storing the payload.
    Active,
    /// Deal term ended without renewal.
    Expired,
    /// Provider was penalized for losing the data.
    Slashed,
}

impl std::fmt::Display for DealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Expired => write!(f, "expired"),
            Self::Slashed => write!(f, "slashed"),
        }
    }
}

/// A redundant storage-location record for one payload.
///
/// Deal records are status reports from an external ledger the core does
/// not control; only the latest snapshot is retained on the proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDeal {
    /// Ledger-assigned deal identifier.
    pub deal_id: u64,
    /// Provider holding this replica.
    pub provider: String,
    /// Last reported state.
    pub state: DealState,
    /// Payload size the provider committed to, in bytes.
    pub size: u64,
}

impl StorageDeal {
    /// Returns `true` if the provider is actively storing the payload.
    pub fn is_active(&self) -> bool {
        self.state == DealState::Active
    }
}

/// Proof of possession for a stored payload.
///
/// Binds a content identifier to exact payload bytes via a domain-separated
/// content hash and a Merkle root over fixed-size chunks, plus the latest
/// snapshot of redundant storage-location records. Verification requires
/// both hashes to match *and* a quorum (strictly more than half) of deals
/// to be active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossessionProof {
    /// The content identifier this proof covers.
    pub cid: Cid,
    /// Domain-separated hash of the full payload.
    pub content_hash: Cid,
    /// Merkle root over `chunk_size` payload chunks.
    pub merkle_root: Cid,
    /// Chunk size the Merkle tree was built with.
    pub chunk_size: usize,
    /// Number of chunks under the root.
    pub chunk_count: usize,
    /// Latest snapshot of storage-location records.
    pub deals: Vec<StorageDeal>,
    /// When the proof was generated.
    pub generated_at: Timestamp,
}

impl PossessionProof {
    /// Generate a proof for a payload.
    pub fn generate(cid: Cid, payload: &[u8], chunk_size: usize, deals: Vec<StorageDeal>) -> Self {
        let tree = ChunkTree::build(payload, chunk_size);
        Self {
            cid,
            content_hash: ContentHasher::PROOF.hash(payload),
            merkle_root: tree.root(),
            chunk_size: tree.chunk_size(),
            chunk_count: tree.chunk_count(),
            deals,
            generated_at: Timestamp::now(),
        }
    }

    /// Recompute both hashes against a payload.
    pub fn content_matches(&self, payload: &[u8]) -> bool {
        ContentHasher::PROOF.hash(payload) == self.content_hash
            && ChunkTree::build(payload, self.chunk_size).root() == self.merkle_root
    }

    /// Returns `true` if strictly more than half of the recorded deals are
    /// active. A proof with no recorded deals proves nothing.
    pub fn has_active_quorum(&self) -> bool {
        let active = self.deals.iter().filter(|d| d.is_active()).count();
        active * 2 > self.deals.len() && !self.deals.is_empty()
    }

    /// Replace the deal snapshot with a fresher one from the ledger.
    pub fn refresh_deals(&mut self, deals: Vec<StorageDeal>) {
        self.deals = deals;
    }
}
