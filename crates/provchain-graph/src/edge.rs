//! Provenance edge: one transformation between two artifacts.
//!
//! An edge may carry a [`TransformationProof`] binding it to the exact
//! before/after payload bytes, not just to node ids, so tampering with
//! either endpoint's stored payload invalidates the edge.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use provchain_crypto::ContentHasher;
use provchain_types::{Cid, EdgeId, NodeId, Timestamp};

use crate::error::{GraphError, GraphResult};
use crate::node::ProvenanceNode;

/// Cryptographic binding of a transformation to its exact inputs/outputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationProof {
    /// Content hash of the input payload.
    pub input_hash: Cid,
    /// Content hash of the output payload.
    pub output_hash: Cid,
    /// How the transformation was performed (e.g., `"normalize_v2"`).
    pub method: String,
    /// Digest of the transformation parameters.
    pub parameters_digest: Cid,
    /// Who or what ran the transformation.
    pub operator: String,
    /// Binding hash over the fields above.
    pub binding: Cid,
}

impl TransformationProof {
    /// Compute a proof binding `(input, output, method, parameters)`.
    pub fn compute(
        method: impl Into<String>,
        parameters: &serde_json::Value,
        input_payload: &[u8],
        output_payload: &[u8],
        operator: impl Into<String>,
    ) -> GraphResult<Self> {
        let method = method.into();
        let input_hash = Cid::of(input_payload);
        let output_hash = Cid::of(output_payload);
        let parameters_digest = ContentHasher::TRANSFORM
            .hash_json(parameters)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        let binding = Self::bind(&input_hash, &output_hash, &method, &parameters_digest);
        Ok(Self {
            input_hash,
            output_hash,
            method,
            parameters_digest,
            operator: operator.into(),
            binding,
        })
    }

    /// Recompute the binding from the recorded fields.
    pub fn recompute_binding(&self) -> Cid {
        Self::bind(
            &self.input_hash,
            &self.output_hash,
            &self.method,
            &self.parameters_digest,
        )
    }

    fn bind(input: &Cid, output: &Cid, method: &str, parameters: &Cid) -> Cid {
        ContentHasher::TRANSFORM.hash_fields(&[
            input.as_bytes(),
            output.as_bytes(),
            method.as_bytes(),
            parameters.as_bytes(),
        ])
    }
}

/// An edge in the provenance graph: one transformation between artifacts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEdge {
    /// Identifier derived from endpoints, relationship, and a
    /// disambiguator.
    pub id: EdgeId,
    /// The artifact the transformation consumed.
    pub source_id: NodeId,
    /// The artifact the transformation produced.
    pub target_id: NodeId,
    /// Free-form classification (e.g., `"data_cleaning"`).
    pub relationship: String,
    /// Optional binding to exact before/after content.
    pub transformation_proof: Option<TransformationProof>,
    /// Outcome of the most recent verification. A cache, not an invariant.
    pub verified: bool,
    /// Creation time.
    pub created_at: Timestamp,
}

impl ProvenanceEdge {
    /// Create an edge. Pure construction: node existence is checked by the
    /// graph's `add_edge`, not here.
    pub fn new(source_id: NodeId, target_id: NodeId, relationship: impl Into<String>) -> Self {
        let relationship = relationship.into();
        Self {
            id: EdgeId::fresh(&source_id, &target_id, &relationship),
            source_id,
            target_id,
            relationship,
            transformation_proof: None,
            verified: false,
            created_at: Timestamp::now(),
        }
    }

    /// Create an edge with an explicit disambiguator (deterministic id).
    pub fn with_disambiguator(
        source_id: NodeId,
        target_id: NodeId,
        relationship: impl Into<String>,
        disambiguator: Uuid,
    ) -> Self {
        let relationship = relationship.into();
        Self {
            id: EdgeId::derive(&source_id, &target_id, &relationship, disambiguator),
            source_id,
            target_id,
            relationship,
            transformation_proof: None,
            verified: false,
            created_at: Timestamp::now(),
        }
    }

    /// Record how the transformation was performed, binding the edge to the
    /// exact before/after payloads.
    pub fn set_transformation_details(
        &mut self,
        method: impl Into<String>,
        parameters: &serde_json::Value,
        input_payload: &[u8],
        output_payload: &[u8],
        operator: impl Into<String>,
    ) -> GraphResult<()> {
        self.transformation_proof = Some(TransformationProof::compute(
            method,
            parameters,
            input_payload,
            output_payload,
            operator,
        )?);
        Ok(())
    }

    /// Verify the edge against its endpoint nodes.
    ///
    /// Fails with `MissingEndpoint` if either node reference is absent:
    /// the caller could not evaluate the edge. With a transformation proof
    /// present, both endpoint payload hashes are recomputed and compared
    /// against the recorded ones; a mismatch fails with `ProofMismatch`
    /// rather than silently returning `false`, so "verified false" and
    /// "could not evaluate" stay distinguishable. Without a proof, endpoint
    /// presence alone decides.
    pub fn verify(
        &mut self,
        source: Option<&ProvenanceNode>,
        target: Option<&ProvenanceNode>,
    ) -> GraphResult<bool> {
        let source = source.ok_or(GraphError::MissingEndpoint {
            edge: self.id,
            missing: self.source_id,
        })?;
        let target = target.ok_or(GraphError::MissingEndpoint {
            edge: self.id,
            missing: self.target_id,
        })?;

        if let Some(proof) = &self.transformation_proof {
            if proof.recompute_binding() != proof.binding {
                self.verified = false;
                return Err(GraphError::ProofMismatch {
                    edge: self.id,
                    detail: "recorded binding does not match its fields".into(),
                });
            }
            if Cid::of(&source.data) != proof.input_hash {
                self.verified = false;
                return Err(GraphError::ProofMismatch {
                    edge: self.id,
                    detail: format!(
                        "source payload of {} differs from recorded input hash",
                        source.id.short_hex()
                    ),
                });
            }
            if Cid::of(&target.data) != proof.output_hash {
                self.verified = false;
                return Err(GraphError::ProofMismatch {
                    edge: self.id,
                    detail: format!(
                        "target payload of {} differs from recorded output hash",
                        target.id.short_hex()
                    ),
                });
            }
        }

        self.verified = true;
        Ok(true)
    }

    /// Returns a human-readable summary of this edge.
    pub fn summary(&self) -> String {
        format!(
            "{} -[{}]-> {} ({})",
            self.source_id.short_hex(),
            self.relationship,
            self.target_id.short_hex(),
            if self.transformation_proof.is_some() {
                "proven"
            } else {
                "unproven"
            },
        )
    }
}
