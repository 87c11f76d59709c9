//! Error types for the provenance graph.

use provchain_resilience::Failure;
use provchain_types::{Cid, EdgeId, NodeId};

/// Errors that can occur during graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Attempted to add a node with an ID that already exists.
    #[error("duplicate node: {0:?}")]
    DuplicateNode(NodeId),

    /// Attempted to add an edge with an ID that already exists.
    #[error("duplicate edge: {0:?}")]
    DuplicateEdge(EdgeId),

    /// A CID may be bound to at most one node.
    #[error("cid {cid:?} is already bound to node {existing:?}")]
    DuplicateCid {
        /// The contested content identifier.
        cid: Cid,
        /// The node already holding it.
        existing: NodeId,
    },

    /// A referenced node was not found in the graph.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// A referenced edge was not found in the graph.
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeId),

    /// An edge endpoint points to a node that is not in the graph.
    #[error("dangling reference: edge {edge:?} references missing node {missing:?}")]
    DanglingReference {
        /// The edge containing the bad reference.
        edge: EdgeId,
        /// The missing endpoint.
        missing: NodeId,
    },

    /// Verification requires the node to be linked to storage first.
    #[error("node {0:?} is not linked to storage")]
    NotLinked(NodeId),

    /// A node's CID is set exactly once; relinking to a different CID is
    /// refused.
    #[error("node {node:?} is already linked to {existing:?}, refusing {requested:?}")]
    AlreadyLinked {
        node: NodeId,
        existing: Cid,
        requested: Cid,
    },

    /// Edge verification was handed a missing endpoint node.
    #[error("edge {edge:?} endpoint missing: {missing:?}")]
    MissingEndpoint { edge: EdgeId, missing: NodeId },

    /// An endpoint payload no longer matches the recorded transformation
    /// proof.
    #[error("transformation proof mismatch on edge {edge:?}: {detail}")]
    ProofMismatch { edge: EdgeId, detail: String },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A classified failure from the storage/resilience layer.
    #[error(transparent)]
    Store(#[from] Failure),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
