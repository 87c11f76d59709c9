//! Filter / sort / paginate queries over the node set.
//!
//! A [`NodeQuery`] carries exactly one primary [`Selector`], an optional
//! `verified` post-filter, a stable sort (ties broken by node id), and
//! offset/limit pagination. Selection goes through the graph's secondary
//! indices where one exists.

use serde::{Deserialize, Serialize};

use provchain_types::{Cid, NodeId, Timestamp};

use crate::graph::ProvChainGraph;
use crate::node::ProvenanceNode;

/// Primary node selector. Exactly one applies per query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// The full node set.
    All,
    /// Exact CID match (at most one node).
    ByCid(Cid),
    /// All nodes of one type.
    ByType(String),
    /// Union of nodes carrying any of the given tags.
    ByTags(Vec<String>),
    /// Nodes created within the inclusive range.
    ByDateRange { from: Timestamp, to: Timestamp },
}

/// Which timestamp the sort uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// Sort direction. Ties are broken by node id, ascending, either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A filter/sort/paginate query over the node set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeQuery {
    /// The primary selector.
    pub selector: Selector,
    /// Secondary filter on the latest verification outcome.
    pub verified: Option<bool>,
    /// Sort key.
    pub sort_key: SortKey,
    /// Sort direction.
    pub sort_direction: SortDirection,
    /// Rows to skip after sorting.
    pub offset: usize,
    /// Maximum rows to return; `None` means unbounded.
    pub limit: Option<usize>,
}

impl Default for NodeQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl NodeQuery {
    /// Query over the full node set.
    pub fn all() -> Self {
        Self {
            selector: Selector::All,
            verified: None,
            sort_key: SortKey::default(),
            sort_direction: SortDirection::default(),
            offset: 0,
            limit: None,
        }
    }

    /// Query by exact CID.
    pub fn by_cid(cid: Cid) -> Self {
        Self {
            selector: Selector::ByCid(cid),
            ..Self::all()
        }
    }

    /// Query by node type.
    pub fn by_type(node_type: impl Into<String>) -> Self {
        Self {
            selector: Selector::ByType(node_type.into()),
            ..Self::all()
        }
    }

    /// Query by tag union.
    pub fn by_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selector: Selector::ByTags(tags.into_iter().map(Into::into).collect()),
            ..Self::all()
        }
    }

    /// Query by inclusive creation-date range.
    pub fn by_date_range(from: Timestamp, to: Timestamp) -> Self {
        Self {
            selector: Selector::ByDateRange { from, to },
            ..Self::all()
        }
    }

    /// Keep only nodes whose latest verification outcome equals `verified`.
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Set the sort key and direction.
    pub fn sorted_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort_key = key;
        self.sort_direction = direction;
        self
    }

    /// Skip the first `offset` rows.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Return at most `limit` rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl ProvChainGraph {
    /// Run a query: primary selection, `verified` post-filter, stable sort,
    /// then offset/limit pagination.
    pub fn query(&self, query: &NodeQuery) -> Vec<&ProvenanceNode> {
        let mut selected: Vec<&ProvenanceNode> = match &query.selector {
            Selector::All => self.nodes().collect(),
            Selector::ByCid(cid) => self.get_node_by_cid(cid).into_iter().collect(),
            Selector::ByType(node_type) => self.get_nodes_by_type(node_type),
            Selector::ByTags(tags) => {
                let mut seen = std::collections::HashSet::new();
                let mut nodes = Vec::new();
                for tag in tags {
                    for node in self.get_nodes_by_tag(tag) {
                        if seen.insert(node.id) {
                            nodes.push(node);
                        }
                    }
                }
                nodes
            }
            Selector::ByDateRange { from, to } => (from.day_bucket()..=to.day_bucket())
                .flat_map(|day| self.nodes_in_day(day))
                .filter(|n| n.created_at >= *from && n.created_at <= *to)
                .collect(),
        };

        if let Some(verified) = query.verified {
            selected.retain(|n| n.is_verified() == verified);
        }

        selected.sort_by(|a, b| {
            let (ka, kb) = match query.sort_key {
                SortKey::CreatedAt => (a.created_at, b.created_at),
                SortKey::UpdatedAt => (a.updated_at, b.updated_at),
            };
            let ordering = match query.sort_direction {
                SortDirection::Ascending => ka.cmp(&kb),
                SortDirection::Descending => kb.cmp(&ka),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        let iter = selected.into_iter().skip(query.offset);
        match query.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
