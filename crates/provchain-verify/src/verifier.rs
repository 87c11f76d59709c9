//! The verification walk over provenance paths.

use tracing::debug;

use provchain_graph::{GraphError, ProvChainGraph};
use provchain_store::CasStore;
use provchain_types::{NodeId, Timestamp};

use crate::report::{PathReport, ProvenanceReport, Subject, VerificationFailure};

/// Errors that prevent a verification run from starting at all.
///
/// Per-step verification failures are *data*: they land in the report,
/// attributed to their node or edge, and never abort the walk.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The target node is not in the graph.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
}

/// Orchestrates node- and edge-level verification across ancestry paths.
#[derive(Clone, Copy, Debug)]
pub struct ProvenanceVerifier {
    max_depth: usize,
}

impl Default for ProvenanceVerifier {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

impl ProvenanceVerifier {
    /// Create a verifier that walks at most `max_depth` ancestry levels.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Verify every provenance path of `target`.
    ///
    /// For each path, every linked node is checked against the store
    /// (unlinked nodes are skipped and counted) and every edge between
    /// consecutive path nodes is checked against its endpoints, in walk
    /// order. A path is valid only if every checked step passed. Failures
    /// carry their subject and never abort the walk.
    pub async fn verify_provenance(
        &self,
        graph: &mut ProvChainGraph,
        store: &CasStore,
        target: &NodeId,
    ) -> Result<ProvenanceReport, VerifyError> {
        if graph.get_node(target).is_none() {
            return Err(VerifyError::NodeNotFound(*target));
        }

        let paths = graph.get_provenance(target, self.max_depth);
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.verify_path(graph, store, &path).await);
        }

        let report = ProvenanceReport {
            target: *target,
            paths: reports,
            generated_at: Timestamp::now(),
        };
        debug!(
            target = %target.short_hex(),
            paths = report.paths.len(),
            failures = report.failure_count(),
            "provenance verified"
        );
        Ok(report)
    }

    async fn verify_path(
        &self,
        graph: &mut ProvChainGraph,
        store: &CasStore,
        path: &[NodeId],
    ) -> PathReport {
        let mut failures = Vec::new();
        let mut steps_checked = 0;
        let mut skipped_unlinked = 0;

        for (position, node_id) in path.iter().enumerate() {
            // Edges into this node from its predecessor on the path.
            if position > 0 {
                let edge_ids: Vec<_> = graph
                    .edges_between(&path[position - 1], node_id)
                    .iter()
                    .map(|e| e.id)
                    .collect();
                for edge_id in edge_ids {
                    steps_checked += 1;
                    match graph.verify_edge(&edge_id) {
                        Ok(true) => {}
                        Ok(false) => failures.push(VerificationFailure {
                            subject: Subject::Edge(edge_id),
                            message: "edge verification reported invalid".into(),
                        }),
                        Err(e) => failures.push(VerificationFailure {
                            subject: Subject::Edge(edge_id),
                            message: e.to_string(),
                        }),
                    }
                }
            }

            match graph.get_node(node_id) {
                Some(node) if !node.is_linked() => {
                    skipped_unlinked += 1;
                    continue;
                }
                Some(_) => {}
                None => continue,
            }

            steps_checked += 1;
            match graph.verify_node(node_id, store).await {
                Ok(true) => {}
                Ok(false) => failures.push(VerificationFailure {
                    subject: Subject::Node(*node_id),
                    message: "possession proof did not verify for the node's payload".into(),
                }),
                Err(GraphError::Store(failure)) => failures.push(VerificationFailure {
                    subject: Subject::Node(*node_id),
                    message: failure.to_string(),
                }),
                Err(e) => failures.push(VerificationFailure {
                    subject: Subject::Node(*node_id),
                    message: e.to_string(),
                }),
            }
        }

        PathReport {
            nodes: path.to_vec(),
            valid: failures.is_empty(),
            steps_checked,
            skipped_unlinked,
            failures,
        }
    }
}
