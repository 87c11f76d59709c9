//! Verification report types.
//!
//! A [`ProvenanceReport`] aggregates one [`PathReport`] per ancestry path;
//! each failure names its exact subject so the transport layer can map it
//! to a compliance finding rather than a crash.

use serde::{Deserialize, Serialize};

use provchain_types::{EdgeId, NodeId, Timestamp};

/// What a verification failure is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Node(NodeId),
    Edge(EdgeId),
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node:{}", id.short_hex()),
            Self::Edge(id) => write!(f, "edge:{}", id.short_hex()),
        }
    }
}

/// One attributed verification failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFailure {
    /// The node or edge that failed.
    pub subject: Subject,
    /// What went wrong.
    pub message: String,
}

/// Verification outcome for one ancestry path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathReport {
    /// The path's nodes, deepest ancestor first.
    pub nodes: Vec<NodeId>,
    /// `true` only if every checked step passed.
    pub valid: bool,
    /// Node and edge checks actually performed.
    pub steps_checked: usize,
    /// Unlinked nodes skipped (they cannot be verified).
    pub skipped_unlinked: usize,
    /// Every failure on this path, in walk order.
    pub failures: Vec<VerificationFailure>,
}

/// Aggregate verification outcome for a target node's full ancestry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceReport {
    /// The node whose provenance was verified.
    pub target: NodeId,
    /// One report per ancestry path.
    pub paths: Vec<PathReport>,
    /// When the verification ran.
    pub generated_at: Timestamp,
}

impl ProvenanceReport {
    /// Returns `true` if every path is valid.
    pub fn is_fully_valid(&self) -> bool {
        self.paths.iter().all(|p| p.valid)
    }

    /// Number of valid paths.
    pub fn valid_path_count(&self) -> usize {
        self.paths.iter().filter(|p| p.valid).count()
    }

    /// All failures across all paths.
    pub fn failures(&self) -> impl Iterator<Item = &VerificationFailure> {
        self.paths.iter().flat_map(|p| p.failures.iter())
    }

    /// Total failure count.
    pub fn failure_count(&self) -> usize {
        self.paths.iter().map(|p| p.failures.len()).sum()
    }
}
