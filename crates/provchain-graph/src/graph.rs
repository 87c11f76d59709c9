//! The provenance graph structure, indices, and traversal algorithms.
//!
//! [`ProvChainGraph`] is the sole owner and writer of the node and edge
//! maps. Four secondary indices (by CID, by type, by tag, by creation day)
//! are derived state, updated in the same call as the map they mirror and
//! rebuildable from scratch on import.
//!
//! # Invariants
//!
//! - Every edge's endpoints resolve to live nodes (checked at insertion).
//! - A CID is bound to at most one node.
//! - Ancestry traversal never revisits a node within a traversal and is
//!   bounded by a caller-supplied depth.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use provchain_store::{CasStore, PossessionProof};
use provchain_types::{Cid, EdgeId, NodeId};

use crate::edge::ProvenanceEdge;
use crate::error::{GraphError, GraphResult};
use crate::node::ProvenanceNode;

/// Edge direction relative to a queried node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Edges pointing into the node.
    Incoming,
    /// Edges leaving the node.
    Outgoing,
    /// Both directions.
    Both,
}

/// Aggregate counts over the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetrics {
    /// Total nodes.
    pub node_count: usize,
    /// Total edges.
    pub edge_count: usize,
    /// Nodes bound to a storage location.
    pub linked_count: usize,
    /// Nodes whose most recent integrity check passed.
    pub verified_count: usize,
    /// Sum of payload sizes across all nodes, in bytes.
    pub total_data_size: u64,
}

/// The provenance graph: artifacts and the transformations between them.
///
/// All operations are synchronous and in-memory except node verification,
/// which suspends on the content-addressed store. Mutation goes through
/// `&mut self`, so a node and its index entries are always updated
/// atomically with respect to readers; embeddings that share the graph
/// across threads wrap it in a lock.
#[derive(Debug, Default)]
pub struct ProvChainGraph {
    nodes: HashMap<NodeId, ProvenanceNode>,
    edges: HashMap<EdgeId, ProvenanceEdge>,
    by_cid: HashMap<Cid, NodeId>,
    by_type: HashMap<String, Vec<NodeId>>,
    by_tag: HashMap<String, Vec<NodeId>>,
    by_day: HashMap<u64, Vec<NodeId>>,
}

impl ProvChainGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add a node, updating all four indices.
    ///
    /// Fails with `DuplicateNode` if the id exists, or `DuplicateCid` if
    /// the node arrives pre-linked to a CID another node already holds.
    /// The graph is not mutated on failure.
    pub fn add_node(&mut self, node: ProvenanceNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if let Some(cid) = node.cid {
            if let Some(&existing) = self.by_cid.get(&cid) {
                return Err(GraphError::DuplicateCid { cid, existing });
            }
        }

        if let Some(cid) = node.cid {
            self.by_cid.insert(cid, node.id);
        }
        self.by_type
            .entry(node.metadata.node_type.clone())
            .or_default()
            .push(node.id);
        for tag in &node.tags {
            self.by_tag.entry(tag.clone()).or_default().push(node.id);
        }
        self.by_day
            .entry(node.created_at.day_bucket())
            .or_default()
            .push(node.id);

        debug!(node = %node.id.short_hex(), node_type = %node.metadata.node_type, "added node");
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Add an edge.
    ///
    /// Fails with `DanglingReference` if either endpoint is missing; this
    /// is checked eagerly at insertion, and the graph is not mutated on
    /// failure.
    pub fn add_edge(&mut self, edge: ProvenanceEdge) -> GraphResult<()> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        for endpoint in [edge.source_id, edge.target_id] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GraphError::DanglingReference {
                    edge: edge.id,
                    missing: endpoint,
                });
            }
        }

        debug!(
            edge = %edge.id.short_hex(),
            relationship = %edge.relationship,
            "added edge"
        );
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Bind a node to a storage location, keeping the CID index in sync.
    ///
    /// Idempotent for the same CID; a CID already bound to another node is
    /// refused with `DuplicateCid`.
    pub fn link_node_to_storage(
        &mut self,
        node_id: &NodeId,
        cid: Cid,
        proof: PossessionProof,
    ) -> GraphResult<()> {
        if let Some(&existing) = self.by_cid.get(&cid) {
            if existing != *node_id {
                return Err(GraphError::DuplicateCid { cid, existing });
            }
        }
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(GraphError::NodeNotFound(*node_id))?;
        node.link_to_storage(cid, proof)?;
        self.by_cid.insert(cid, *node_id);
        Ok(())
    }

    /// Add a tag to a node, keeping the tag index in sync.
    pub fn tag_node(&mut self, node_id: &NodeId, tag: &str) -> GraphResult<bool> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(GraphError::NodeNotFound(*node_id))?;
        let changed = node.add_tag(tag);
        if changed {
            self.by_tag.entry(tag.to_string()).or_default().push(*node_id);
        }
        Ok(changed)
    }

    /// Remove a tag from a node, keeping the tag index in sync.
    pub fn untag_node(&mut self, node_id: &NodeId, tag: &str) -> GraphResult<bool> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(GraphError::NodeNotFound(*node_id))?;
        let changed = node.remove_tag(tag);
        if changed {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.retain(|id| id != node_id);
                if ids.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
        Ok(changed)
    }

    /// Verify a node's payload against the store, appending to its history.
    pub async fn verify_node(&mut self, node_id: &NodeId, store: &CasStore) -> GraphResult<bool> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or(GraphError::NodeNotFound(*node_id))?;
        node.verify(store).await
    }

    /// Verify an edge against its endpoint nodes, updating its cached
    /// `verified` flag.
    pub fn verify_edge(&mut self, edge_id: &EdgeId) -> GraphResult<bool> {
        let (source_id, target_id) = {
            let edge = self
                .edges
                .get(edge_id)
                .ok_or(GraphError::EdgeNotFound(*edge_id))?;
            (edge.source_id, edge.target_id)
        };
        let source = self.nodes.get(&source_id);
        let target = self.nodes.get(&target_id);
        let edge = self.edges.get_mut(edge_id).expect("edge checked above");
        edge.verify(source, target)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Retrieve a node by id.
    pub fn get_node(&self, id: &NodeId) -> Option<&ProvenanceNode> {
        self.nodes.get(id)
    }

    /// Retrieve an edge by id.
    pub fn get_edge(&self, id: &EdgeId) -> Option<&ProvenanceEdge> {
        self.edges.get(id)
    }

    /// Look up the node bound to a CID.
    pub fn get_node_by_cid(&self, cid: &Cid) -> Option<&ProvenanceNode> {
        self.by_cid.get(cid).and_then(|id| self.nodes.get(id))
    }

    /// All nodes of a given type.
    pub fn get_nodes_by_type(&self, node_type: &str) -> Vec<&ProvenanceNode> {
        self.by_type
            .get(node_type)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// All nodes carrying a given tag.
    pub fn get_nodes_by_tag(&self, tag: &str) -> Vec<&ProvenanceNode> {
        self.by_tag
            .get(tag)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Iterate over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &ProvenanceNode> {
        self.nodes.values()
    }

    /// Iterate over all edges.
    pub fn edges(&self) -> impl Iterator<Item = &ProvenanceEdge> {
        self.edges.values()
    }

    /// Nodes created in the given day bucket.
    pub(crate) fn nodes_in_day(&self, day: u64) -> impl Iterator<Item = &ProvenanceNode> {
        self.by_day
            .get(&day)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
    }

    /// Neighboring nodes connected by an edge, with the edge and its
    /// direction relative to `node_id`.
    ///
    /// Linear scan over the edge map, adequate at the graph sizes this
    /// core targets; an adjacency list is the upgrade path if edge counts
    /// grow.
    pub fn neighbors(
        &self,
        node_id: &NodeId,
        direction: Direction,
    ) -> Vec<(&ProvenanceNode, &ProvenanceEdge, Direction)> {
        let mut result = Vec::new();
        for edge in self.edges.values() {
            if matches!(direction, Direction::Outgoing | Direction::Both)
                && edge.source_id == *node_id
            {
                if let Some(node) = self.nodes.get(&edge.target_id) {
                    result.push((node, edge, Direction::Outgoing));
                }
            }
            if matches!(direction, Direction::Incoming | Direction::Both)
                && edge.target_id == *node_id
            {
                if let Some(node) = self.nodes.get(&edge.source_id) {
                    result.push((node, edge, Direction::Incoming));
                }
            }
        }
        result
    }

    /// All edges from `source` to `target`.
    pub fn edges_between(&self, source: &NodeId, target: &NodeId) -> Vec<&ProvenanceEdge> {
        self.edges
            .values()
            .filter(|e| e.source_id == *source && e.target_id == *target)
            .collect()
    }

    /// Aggregate counts, recomputed from the maps.
    pub fn metrics(&self) -> GraphMetrics {
        GraphMetrics {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            linked_count: self.nodes.values().filter(|n| n.is_linked()).count(),
            verified_count: self.nodes.values().filter(|n| n.is_verified()).count(),
            total_data_size: self.nodes.values().map(|n| n.metadata.data_size).sum(),
        }
    }

    // ---------------------------------------------------------------
    // Ancestry traversal
    // ---------------------------------------------------------------

    /// All provenance paths ending at `node_id`, walking backward along
    /// incoming edges.
    ///
    /// A path is emitted when the walk reaches a node with no unvisited
    /// predecessors or the depth bound; each path is ordered from deepest
    /// ancestor to `node_id` and contains at most `max_depth + 1` nodes
    /// with no repeats. Cycle safety comes from a visited set scoped to
    /// the whole traversal, so a shared ancestor reachable via two
    /// branches is reported on the first path only. This is cheaper than per-path
    /// visited sets at the cost of understating path diversity through
    /// diamonds.
    ///
    /// Returns an empty set if the node is not in the graph.
    pub fn get_provenance(&self, node_id: &NodeId, max_depth: usize) -> Vec<Vec<NodeId>> {
        if !self.nodes.contains_key(node_id) {
            return Vec::new();
        }
        let mut paths = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(*node_id);
        let mut path = vec![*node_id];
        self.walk_ancestry(*node_id, max_depth, 0, &mut path, &mut visited, &mut paths);
        paths
    }

    fn walk_ancestry(
        &self,
        current: NodeId,
        max_depth: usize,
        depth: usize,
        path: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
        paths: &mut Vec<Vec<NodeId>>,
    ) {
        let mut predecessors: Vec<NodeId> = self
            .edges
            .values()
            .filter(|e| e.target_id == current)
            .map(|e| e.source_id)
            .filter(|s| !visited.contains(s))
            .collect();
        predecessors.sort();
        predecessors.dedup();

        if predecessors.is_empty() || depth >= max_depth {
            let mut complete = path.clone();
            complete.reverse(); // deepest ancestor first
            paths.push(complete);
            return;
        }

        for pred in predecessors {
            // A sibling branch may have claimed this ancestor already.
            if !visited.insert(pred) {
                continue;
            }
            path.push(pred);
            self.walk_ancestry(pred, max_depth, depth + 1, path, visited, paths);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use provchain_store::{CasStore, InMemoryBackend, PayloadMetadata, StoreConfig};

    fn node(payload: &[u8], node_type: &str) -> ProvenanceNode {
        ProvenanceNode::new(payload.to_vec(), node_type)
    }

    fn edge(source: &ProvenanceNode, target: &ProvenanceNode, rel: &str) -> ProvenanceEdge {
        ProvenanceEdge::new(source.id, target.id, rel)
    }

    fn test_store() -> (CasStore, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new(3));
        let store = CasStore::new(backend.clone(), StoreConfig::default());
        (store, backend)
    }

    /// Build a linear chain A -> B -> C and return the graph with ids.
    fn build_chain() -> (ProvChainGraph, NodeId, NodeId, NodeId) {
        let mut graph = ProvChainGraph::new();
        let a = node(b"raw", "dataset");
        let b = node(b"cleaned", "dataset");
        let c = node(b"model", "model");
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        let ab = edge(&a, &b, "clean");
        let bc = edge(&b, &c, "train");
        graph.add_node(a).unwrap();
        graph.add_node(b).unwrap();
        graph.add_node(c).unwrap();
        graph.add_edge(ab).unwrap();
        graph.add_edge(bc).unwrap();
        (graph, a_id, b_id, c_id)
    }

    /// Build a diamond:
    ///   A
    ///  / \
    /// B   C
    ///  \ /
    ///   D
    fn build_diamond() -> (ProvChainGraph, [NodeId; 4]) {
        let mut graph = ProvChainGraph::new();
        let a = node(b"a", "dataset");
        let b = node(b"b", "dataset");
        let c = node(b"c", "dataset");
        let d = node(b"d", "dataset");
        let ids = [a.id, b.id, c.id, d.id];
        let edges = vec![
            edge(&a, &b, "split"),
            edge(&a, &c, "split"),
            edge(&b, &d, "join"),
            edge(&c, &d, "join"),
        ];
        for n in [a, b, c, d] {
            graph.add_node(n).unwrap();
        }
        for e in edges {
            graph.add_edge(e).unwrap();
        }
        (graph, ids)
    }

    // ----------------------------------------------------------
    // Construction & indices
    // ----------------------------------------------------------

    #[test]
    fn empty_graph() {
        let graph = ProvChainGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.metrics(), GraphMetrics::default());
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut graph = ProvChainGraph::new();
        let n = node(b"x", "dataset");
        let dup = n.clone();
        graph.add_node(n).unwrap();
        assert!(matches!(
            graph.add_node(dup),
            Err(GraphError::DuplicateNode(_))
        ));
    }

    #[test]
    fn dangling_edge_is_rejected_without_mutation() {
        let mut graph = ProvChainGraph::new();
        let a = node(b"a", "dataset");
        let ghost = node(b"ghost", "dataset");
        let bad = edge(&a, &ghost, "clean");
        graph.add_node(a).unwrap();

        assert!(matches!(
            graph.add_edge(bad),
            Err(GraphError::DanglingReference { .. })
        ));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn type_index_answers_lookups() {
        let (graph, _, _, c) = build_chain();
        let models = graph.get_nodes_by_type("model");
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, c);
        assert_eq!(graph.get_nodes_by_type("dataset").len(), 2);
        assert!(graph.get_nodes_by_type("unknown").is_empty());
    }

    #[test]
    fn tag_index_follows_mutations() {
        let (mut graph, a, b, _) = build_chain();
        graph.tag_node(&a, "raw").unwrap();
        graph.tag_node(&b, "raw").unwrap();
        assert_eq!(graph.get_nodes_by_tag("raw").len(), 2);

        // Idempotent add does not duplicate the index entry.
        assert!(!graph.tag_node(&a, "raw").unwrap());
        assert_eq!(graph.get_nodes_by_tag("raw").len(), 2);

        graph.untag_node(&a, "raw").unwrap();
        assert_eq!(graph.get_nodes_by_tag("raw").len(), 1);
        graph.untag_node(&b, "raw").unwrap();
        assert!(graph.get_nodes_by_tag("raw").is_empty());
    }

    #[test]
    fn tagging_missing_node_fails() {
        let mut graph = ProvChainGraph::new();
        let ghost = NodeId::from_hash([9; 32]);
        assert!(matches!(
            graph.tag_node(&ghost, "t"),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    // ----------------------------------------------------------
    // Storage linking & CID index
    // ----------------------------------------------------------

    #[tokio::test]
    async fn link_node_updates_cid_index() {
        let (store, _) = test_store();
        let (mut graph, a, _, _) = build_chain();
        let payload = graph.get_node(&a).unwrap().data.clone();
        let receipt = store.store(payload, PayloadMetadata::default()).await.unwrap();

        graph
            .link_node_to_storage(&a, receipt.cid, receipt.proof)
            .unwrap();
        assert_eq!(graph.get_node_by_cid(&receipt.cid).unwrap().id, a);
        assert_eq!(graph.metrics().linked_count, 1);
    }

    #[tokio::test]
    async fn duplicate_cid_binding_is_rejected() {
        let (store, _) = test_store();
        let (mut graph, a, b, _) = build_chain();
        let payload = graph.get_node(&a).unwrap().data.clone();
        let receipt = store.store(payload, PayloadMetadata::default()).await.unwrap();

        graph
            .link_node_to_storage(&a, receipt.cid, receipt.proof.clone())
            .unwrap();
        let err = graph
            .link_node_to_storage(&b, receipt.cid, receipt.proof)
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateCid { .. }));
    }

    #[tokio::test]
    async fn importing_prelinked_duplicate_cid_fails() {
        let (store, _) = test_store();
        let receipt = store
            .store(b"shared".to_vec(), PayloadMetadata::default())
            .await
            .unwrap();

        let mut first = node(b"shared", "dataset");
        first.link_to_storage(receipt.cid, receipt.proof.clone()).unwrap();
        let mut second = node(b"shared", "dataset");
        second.link_to_storage(receipt.cid, receipt.proof).unwrap();

        let mut graph = ProvChainGraph::new();
        graph.add_node(first).unwrap();
        assert!(matches!(
            graph.add_node(second),
            Err(GraphError::DuplicateCid { .. })
        ));
    }

    // ----------------------------------------------------------
    // Node verification through the graph
    // ----------------------------------------------------------

    #[tokio::test]
    async fn verify_unlinked_node_fails_not_linked() {
        let (store, _) = test_store();
        let (mut graph, a, _, _) = build_chain();
        let err = graph.verify_node(&a, &store).await.unwrap_err();
        assert!(matches!(err, GraphError::NotLinked(id) if id == a));
    }

    #[tokio::test]
    async fn verify_linked_node_appends_history() {
        let (store, _) = test_store();
        let (mut graph, a, _, _) = build_chain();
        let payload = graph.get_node(&a).unwrap().data.clone();
        let receipt = store.store(payload, PayloadMetadata::default()).await.unwrap();
        graph
            .link_node_to_storage(&a, receipt.cid, receipt.proof)
            .unwrap();

        assert!(graph.verify_node(&a, &store).await.unwrap());
        let node = graph.get_node(&a).unwrap();
        assert!(node.is_verified());
        // One storage_linked entry plus one integrity_check entry.
        assert_eq!(node.verification_history.len(), 2);
        assert_eq!(graph.metrics().verified_count, 1);
    }

    // ----------------------------------------------------------
    // Neighbors
    // ----------------------------------------------------------

    #[test]
    fn neighbors_by_direction() {
        let (graph, a, b, c) = build_chain();

        let incoming = graph.neighbors(&b, Direction::Incoming);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].0.id, a);
        assert_eq!(incoming[0].2, Direction::Incoming);

        let outgoing = graph.neighbors(&b, Direction::Outgoing);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].0.id, c);

        let both = graph.neighbors(&b, Direction::Both);
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn neighbors_of_isolated_node() {
        let mut graph = ProvChainGraph::new();
        let n = node(b"alone", "dataset");
        let id = n.id;
        graph.add_node(n).unwrap();
        assert!(graph.neighbors(&id, Direction::Both).is_empty());
    }

    // ----------------------------------------------------------
    // Provenance traversal
    // ----------------------------------------------------------

    #[test]
    fn linear_chain_yields_single_path() {
        let (graph, a, b, c) = build_chain();
        let paths = graph.get_provenance(&c, 10);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0], vec![a, b, c]);
    }

    #[test]
    fn source_node_yields_itself() {
        let (graph, a, _, _) = build_chain();
        let paths = graph.get_provenance(&a, 10);
        assert_eq!(paths, vec![vec![a]]);
    }

    #[test]
    fn unknown_node_yields_no_paths() {
        let (graph, _, _, _) = build_chain();
        assert!(graph
            .get_provenance(&NodeId::from_hash([99; 32]), 10)
            .is_empty());
    }

    #[test]
    fn max_depth_bounds_path_length() {
        let (graph, _, b, c) = build_chain();
        let paths = graph.get_provenance(&c, 1);
        assert_eq!(paths.len(), 1);
        // Truncated at depth 1: two nodes, ending at the target.
        assert_eq!(paths[0], vec![b, c]);
        for path in &paths {
            assert!(path.len() <= 2);
        }
    }

    #[test]
    fn depth_zero_is_just_the_target() {
        let (graph, _, _, c) = build_chain();
        assert_eq!(graph.get_provenance(&c, 0), vec![vec![c]]);
    }

    #[test]
    fn paths_never_repeat_a_node() {
        let (graph, ids) = build_diamond();
        let paths = graph.get_provenance(&ids[3], 10);
        for path in &paths {
            let unique: HashSet<&NodeId> = path.iter().collect();
            assert_eq!(unique.len(), path.len());
        }
    }

    #[test]
    fn diamond_reports_shared_ancestor_once() {
        // Pins the traversal-global visited-set choice: the ancestor A is
        // reported on the first branch that reaches it; the second branch's
        // path stops where its predecessors are exhausted.
        let (graph, [a, b, c, d]) = build_diamond();
        let paths = graph.get_provenance(&d, 10);
        assert_eq!(paths.len(), 2);

        let full: Vec<_> = paths.iter().filter(|p| p.len() == 3).collect();
        let short: Vec<_> = paths.iter().filter(|p| p.len() == 2).collect();
        assert_eq!(full.len(), 1);
        assert_eq!(short.len(), 1);
        assert_eq!(full[0][0], a);
        assert_eq!(full[0][2], d);
        assert_eq!(short[0][1], d);

        // A appears in exactly one path.
        let a_occurrences = paths.iter().filter(|p| p.contains(&a)).count();
        assert_eq!(a_occurrences, 1);
        // Both middle nodes are covered across the two paths.
        let middles: HashSet<NodeId> = paths.iter().map(|p| p[p.len() - 2]).collect();
        assert_eq!(middles, HashSet::from([b, c]));
    }

    #[test]
    fn cycle_terminates() {
        let mut graph = ProvChainGraph::new();
        let a = node(b"a", "dataset");
        let b = node(b"b", "dataset");
        let (a_id, b_id) = (a.id, b.id);
        let ab = edge(&a, &b, "forward");
        let ba = edge(&b, &a, "backward");
        graph.add_node(a).unwrap();
        graph.add_node(b).unwrap();
        graph.add_edge(ab).unwrap();
        graph.add_edge(ba).unwrap();

        let paths = graph.get_provenance(&b_id, 100);
        assert_eq!(paths, vec![vec![a_id, b_id]]);
    }

    // ----------------------------------------------------------
    // Edge verification through the graph
    // ----------------------------------------------------------

    #[test]
    fn verify_edge_sets_cached_flag() {
        let (mut graph, a, b, _) = build_chain();
        let edge_id = graph.edges_between(&a, &b)[0].id;
        assert!(graph.verify_edge(&edge_id).unwrap());
        assert!(graph.get_edge(&edge_id).unwrap().verified);
    }

    // ----------------------------------------------------------
    // Metrics
    // ----------------------------------------------------------

    #[test]
    fn metrics_reflect_graph_contents() {
        let (graph, ..) = build_chain();
        let metrics = graph.metrics();
        assert_eq!(metrics.node_count, 3);
        assert_eq!(metrics.edge_count, 2);
        assert_eq!(metrics.linked_count, 0);
        assert_eq!(metrics.verified_count, 0);
        // "raw" + "cleaned" + "model"
        assert_eq!(metrics.total_data_size, 3 + 7 + 5);
    }
}
