//! Graph snapshots: the sole persistence boundary.
//!
//! [`GraphSnapshot`] is a self-describing serialized view of the full
//! graph. Import replaces all in-memory state and rebuilds every secondary
//! index from scratch, re-running the same validation as live insertion.
//! A snapshot carrying a dangling edge or duplicate CID is rejected.

use serde::{Deserialize, Serialize};
use tracing::debug;

use provchain_types::Timestamp;

use crate::edge::ProvenanceEdge;
use crate::error::{GraphError, GraphResult};
use crate::graph::{GraphMetrics, ProvChainGraph};
use crate::node::ProvenanceNode;

/// A serializable snapshot of the full graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// All nodes, ordered by creation time then id for determinism.
    pub nodes: Vec<ProvenanceNode>,
    /// All edges, ordered by creation time then id.
    pub edges: Vec<ProvenanceEdge>,
    /// Metrics at export time.
    pub metrics: GraphMetrics,
    /// When the snapshot was taken.
    pub exported_at: Timestamp,
}

impl GraphSnapshot {
    /// Serialize to JSON bytes. JSON keeps the snapshot self-describing,
    /// which the open metadata values require.
    pub fn to_bytes(&self) -> GraphResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(data: &[u8]) -> GraphResult<Self> {
        serde_json::from_slice(data).map_err(|e| GraphError::Serialization(e.to_string()))
    }
}

impl ProvChainGraph {
    /// Export the graph as a snapshot.
    pub fn export(&self) -> GraphSnapshot {
        let mut nodes: Vec<ProvenanceNode> = self.nodes().cloned().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let mut edges: Vec<ProvenanceEdge> = self.edges().cloned().collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        GraphSnapshot {
            metrics: self.metrics(),
            nodes,
            edges,
            exported_at: Timestamp::now(),
        }
    }

    /// Build a graph from a snapshot, reconstructing all indices from
    /// scratch.
    ///
    /// Nodes are inserted before edges so the dangling-reference invariant
    /// is enforced exactly as during live insertion.
    pub fn import(snapshot: GraphSnapshot) -> GraphResult<Self> {
        let mut graph = Self::new();
        for node in snapshot.nodes {
            graph.add_node(node)?;
        }
        for edge in snapshot.edges {
            graph.add_edge(edge)?;
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph imported from snapshot"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use provchain_store::{CasStore, InMemoryBackend, PayloadMetadata, StoreConfig};

    async fn build_populated_graph() -> (ProvChainGraph, CasStore) {
        let backend = Arc::new(InMemoryBackend::new(3));
        let store = CasStore::new(backend, StoreConfig::default());

        let mut graph = ProvChainGraph::new();
        let a = ProvenanceNode::new(b"raw".to_vec(), "dataset");
        let b = ProvenanceNode::new(b"clean".to_vec(), "dataset");
        let (a_id, b_id) = (a.id, b.id);
        let mut ab = ProvenanceEdge::new(a_id, b_id, "clean");
        ab.set_transformation_details(
            "drop_nulls",
            &serde_json::json!({"threshold": 0.5}),
            b"raw",
            b"clean",
            "pipeline",
        )
        .unwrap();

        graph.add_node(a).unwrap();
        graph.add_node(b).unwrap();
        graph.add_edge(ab).unwrap();
        graph.tag_node(&a_id, "source").unwrap();

        let receipt = store
            .store(b"raw".to_vec(), PayloadMetadata::default())
            .await
            .unwrap();
        graph
            .link_node_to_storage(&a_id, receipt.cid, receipt.proof)
            .unwrap();

        (graph, store)
    }

    #[tokio::test]
    async fn roundtrip_preserves_counts_and_indices() {
        let (graph, _store) = build_populated_graph().await;
        let snapshot = graph.export();
        let restored = ProvChainGraph::import(snapshot).unwrap();

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
        assert_eq!(restored.metrics(), graph.metrics());

        // CID index survives.
        let linked: Vec<_> = graph.nodes().filter(|n| n.is_linked()).collect();
        assert_eq!(linked.len(), 1);
        let cid = linked[0].cid.unwrap();
        assert_eq!(
            restored.get_node_by_cid(&cid).unwrap().id,
            graph.get_node_by_cid(&cid).unwrap().id
        );

        // Tag index survives.
        assert_eq!(
            restored.get_nodes_by_tag("source").len(),
            graph.get_nodes_by_tag("source").len()
        );
    }

    #[tokio::test]
    async fn byte_roundtrip() {
        let (graph, _store) = build_populated_graph().await;
        let bytes = graph.export().to_bytes().unwrap();
        let snapshot = GraphSnapshot::from_bytes(&bytes).unwrap();
        let restored = ProvChainGraph::import(snapshot).unwrap();
        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.edge_count(), 1);

        // Transformation proofs survive serialization.
        let edge = restored.edges().next().unwrap();
        let proof = edge.transformation_proof.as_ref().unwrap();
        assert_eq!(proof.method, "drop_nulls");
    }

    #[test]
    fn import_rejects_dangling_edges() {
        let node = ProvenanceNode::new(b"only".to_vec(), "dataset");
        let ghost = ProvenanceNode::new(b"ghost".to_vec(), "dataset");
        let edge = ProvenanceEdge::new(node.id, ghost.id, "clean");

        let snapshot = GraphSnapshot {
            nodes: vec![node],
            edges: vec![edge],
            metrics: GraphMetrics::default(),
            exported_at: Timestamp::now(),
        };
        assert!(matches!(
            ProvChainGraph::import(snapshot),
            Err(GraphError::DanglingReference { .. })
        ));
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(matches!(
            GraphSnapshot::from_bytes(b"not json"),
            Err(GraphError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn exported_snapshot_is_deterministically_ordered() {
        let (graph, _store) = build_populated_graph().await;
        let a = graph.export();
        let b = graph.export();
        let a_ids: Vec<_> = a.nodes.iter().map(|n| n.id).collect();
        let b_ids: Vec<_> = b.nodes.iter().map(|n| n.id).collect();
        assert_eq!(a_ids, b_ids);
    }
}
