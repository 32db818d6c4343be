//! Pure set-diff between two snapshots.

use crate::models::delta::{Delta, DeltaStats};
use crate::models::graph::{edge_key, Edge, Node, Snapshot};
use rustc_hash::FxHashSet;
use uuid::Uuid;

/// Diffs `head` against `base`. Node diff is keyed on `key`; edge diff is
/// keyed on the `(from, to, type)` identity triple. Output ordering is
/// deterministic: nodes ascending by `key`, edges ascending by
/// `(from, to, type)`.
pub fn compute_delta(base: &Snapshot, head: &Snapshot, impacted_targets: Vec<String>) -> Delta {
    let mut added_nodes: Vec<Node> = head
        .nodes
        .iter()
        .filter(|(k, _)| !base.nodes.contains_key(*k))
        .map(|(_, n)| n.clone())
        .collect();
    added_nodes.sort_by(|a, b| a.key.cmp(&b.key));

    let mut removed_nodes: Vec<Node> = base
        .nodes
        .iter()
        .filter(|(k, _)| !head.nodes.contains_key(*k))
        .map(|(_, n)| n.clone())
        .collect();
    removed_nodes.sort_by(|a, b| a.key.cmp(&b.key));

    let base_edge_keys: FxHashSet<String> = base.edges.iter().map(edge_key).collect();
    let head_edge_keys: FxHashSet<String> = head.edges.iter().map(edge_key).collect();

    let mut added_edges: Vec<Edge> = head
        .edges
        .iter()
        .filter(|e| !base_edge_keys.contains(&edge_key(e)))
        .cloned()
        .collect();
    sort_edges(&mut added_edges);

    let mut removed_edges: Vec<Edge> = base
        .edges
        .iter()
        .filter(|e| !head_edge_keys.contains(&edge_key(e)))
        .cloned()
        .collect();
    sort_edges(&mut removed_edges);

    let stats = DeltaStats {
        added_node_count: added_nodes.len(),
        removed_node_count: removed_nodes.len(),
        added_edge_count: added_edges.len(),
        removed_edge_count: removed_edges.len(),
    };

    Delta {
        id: Uuid::new_v4(),
        base_snapshot_id: base.id,
        head_snapshot_id: head.id,
        base_commit: base.commit_sha.clone(),
        head_commit: head.commit_sha.clone(),
        impacted_targets,
        added_nodes,
        removed_nodes,
        added_edges,
        removed_edges,
        stats,
    }
}

fn sort_edges(edges: &mut [Edge]) {
    edges.sort_by(|a, b| {
        (a.from.as_str(), a.to.as_str(), a.edge_type.as_str()).cmp(&(
            b.from.as_str(),
            b.to.as_str(),
            b.edge_type.as_str(),
        ))
    });
}
