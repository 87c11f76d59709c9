//! Provenance node: one data artifact and its verification history.
//!
//! A [`ProvenanceNode`]'s payload and identifier are immutable after
//! creation: a transformation produces a *new* node, never mutates an
//! existing one in place. A node may be linked to content-addressed
//! storage exactly once; from then on it can be verified any number of
//! times, each attempt appending to its history.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use provchain_store::{CasStore, PossessionProof};
use provchain_types::{Cid, NodeId, Timestamp};

use crate::error::{GraphError, GraphResult};

/// Metadata attached to a node.
///
/// The invariant fields (`node_type`, `data_size`) are always present;
/// anything else goes into the open `extra` map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Resolved classification of the artifact (e.g., `"dataset"`).
    pub node_type: String,
    /// Payload size in bytes, computed at creation.
    pub data_size: u64,
    /// Open extension fields.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// What a verification-history entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationAction {
    /// The node was bound to a storage location.
    StorageLinked,
    /// The node's payload was checked against its possession proof.
    IntegrityCheck,
}

impl std::fmt::Display for VerificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageLinked => write!(f, "storage_linked"),
            Self::IntegrityCheck => write!(f, "integrity_check"),
        }
    }
}

/// One verification attempt. History entries are append-only: never
/// truncated, never reordered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// When the attempt happened.
    pub at: Timestamp,
    /// What was attempted.
    pub action: VerificationAction,
    /// Whether the attempt succeeded.
    pub outcome: bool,
    /// How the check was performed (e.g., `"possession_proof"`).
    pub method: String,
}

/// A node in the provenance graph: one immutable data artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceNode {
    /// Stable identifier, assigned at creation, never reassigned.
    pub id: NodeId,
    /// The artifact payload. Immutable after creation.
    pub data: Vec<u8>,
    /// Metadata with guaranteed `node_type`/`data_size` fields.
    pub metadata: NodeMetadata,
    /// Content identifier, set exactly once by a store-and-link.
    pub cid: Option<Cid>,
    /// Possession proof, present iff `cid` is present.
    pub storage_proof: Option<PossessionProof>,
    /// Append-only record of verification attempts.
    pub verification_history: Vec<VerificationRecord>,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Bumped on link and tag mutations.
    pub version: u32,
}

impl ProvenanceNode {
    /// Create a node for a payload. Never fails.
    ///
    /// The identifier is derived from the payload plus a fresh nonce, so
    /// identical payloads still get distinct nodes.
    pub fn new(data: Vec<u8>, node_type: impl Into<String>) -> Self {
        let now = Timestamp::now();
        let data_size = data.len() as u64;
        Self {
            id: NodeId::fresh(&data),
            metadata: NodeMetadata {
                node_type: node_type.into(),
                data_size,
                extra: BTreeMap::new(),
            },
            data,
            cid: None,
            storage_proof: None,
            verification_history: Vec::new(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Attach an open metadata field at construction time.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    /// Returns `true` if the node is bound to a storage location.
    pub fn is_linked(&self) -> bool {
        self.cid.is_some()
    }

    /// The outcome of the most recent integrity check, or `false` if the
    /// node was never checked.
    pub fn is_verified(&self) -> bool {
        self.verification_history
            .iter()
            .rev()
            .find(|r| r.action == VerificationAction::IntegrityCheck)
            .map(|r| r.outcome)
            .unwrap_or(false)
    }

    /// Bind the node to a storage location.
    ///
    /// Idempotent when called again with the same CID (no duplicate
    /// history entry); fails with `AlreadyLinked` for a different CID.
    pub fn link_to_storage(&mut self, cid: Cid, proof: PossessionProof) -> GraphResult<()> {
        match self.cid {
            Some(existing) if existing == cid => Ok(()),
            Some(existing) => Err(GraphError::AlreadyLinked {
                node: self.id,
                existing,
                requested: cid,
            }),
            None => {
                self.cid = Some(cid);
                self.storage_proof = Some(proof);
                self.push_history(VerificationAction::StorageLinked, true, "store_and_link");
                self.version += 1;
                Ok(())
            }
        }
    }

    /// Verify the node's payload against the store's possession proof.
    ///
    /// Fails with `NotLinked` if the node has no CID. The attempt is
    /// appended to the verification history whether it succeeds, reports
    /// an invalid proof, or fails store-side; in the last case the
    /// classified failure propagates to the caller instead of being
    /// swallowed.
    pub async fn verify(&mut self, store: &CasStore) -> GraphResult<bool> {
        let cid = self.cid.ok_or(GraphError::NotLinked(self.id))?;
        match store.verify_proof(&cid, &self.data).await {
            Ok(valid) => {
                self.push_history(VerificationAction::IntegrityCheck, valid, "possession_proof");
                Ok(valid)
            }
            Err(failure) => {
                self.push_history(
                    VerificationAction::IntegrityCheck,
                    false,
                    format!("possession_proof:{}", failure.kind),
                );
                Err(GraphError::Store(
                    failure.with_subject(format!("node:{}", self.id.short_hex())),
                ))
            }
        }
    }

    /// Add a tag. Returns `true` (and bumps `updated_at`) only on actual
    /// change.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let changed = self.tags.insert(tag.into());
        if changed {
            self.touch();
        }
        changed
    }

    /// Remove a tag. Returns `true` (and bumps `updated_at`) only on
    /// actual change.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let changed = self.tags.remove(tag);
        if changed {
            self.touch();
        }
        changed
    }

    /// Returns a human-readable summary of this node.
    pub fn summary(&self) -> String {
        format!(
            "{} {} ({} bytes, {})",
            self.metadata.node_type,
            self.id.short_hex(),
            self.metadata.data_size,
            if self.is_linked() { "linked" } else { "unlinked" },
        )
    }

    fn push_history(&mut self, action: VerificationAction, outcome: bool, method: impl Into<String>) {
        self.verification_history.push(VerificationRecord {
            at: Timestamp::now(),
            action,
            outcome,
            method: method.into(),
        });
        self.updated_at = Timestamp::now();
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
        self.version += 1;
    }
}
