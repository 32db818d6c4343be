//! The structural difference between two snapshots (spec §3, §4.4).

use crate::models::graph::{Edge, Node};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeltaStats {
    pub added_node_count: usize,
    pub removed_node_count: usize,
    pub added_edge_count: usize,
    pub removed_edge_count: usize,
}

/// Immutable diff between a base and a head snapshot. Node ordering is
/// ascending by `key`; edge ordering is ascending by `(from, to, type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub id: Uuid,
    pub base_snapshot_id: Uuid,
    pub head_snapshot_id: Uuid,
    pub base_commit: String,
    pub head_commit: String,
    pub impacted_targets: Vec<String>,
    pub added_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
    pub added_edges: Vec<Edge>,
    pub removed_edges: Vec<Edge>,
    pub stats: DeltaStats,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.stats.added_node_count == 0
            && self.stats.removed_node_count == 0
            && self.stats.added_edge_count == 0
            && self.stats.removed_edge_count == 0
    }
}
