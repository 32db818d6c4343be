//! End-to-end scenarios from spec §8: exercises delta computation and
//! scoring together the way the pipeline orchestrator would, plus the
//! dirty-working-tree rejection that gates any checkout.

use std::process::Command;

use toposcope::models::graph::{Edge, EdgeType, Node, Snapshot};
use toposcope::models::score::Grade;
use toposcope::services::delta::compute_delta;
use toposcope::services::git_ops;
use toposcope::services::scoring::{default_metrics, ScoringEngine};

fn snap(commit: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Snapshot {
    Snapshot::build(commit, None, false, vec![], nodes, edges, 0, chrono::Utc::now())
}

fn score(base: &Snapshot, head: &Snapshot) -> toposcope::models::score::ScoreResult {
    let delta = compute_delta(base, head, vec![]);
    ScoringEngine::new(default_metrics()).score(&delta, base, head)
}

/// Scenario 1: base == head. Expected: zero counts on every front, grade A.
#[test]
fn empty_diff_scenario() {
    let s = snap(
        "deadbeef",
        vec![
            Node::new("//app:a", "rust_binary"),
            Node::new("//lib:b", "rust_library"),
        ],
        vec![Edge::new("//app:a", "//lib:b", EdgeType::Compile)],
    );
    let delta = compute_delta(&s, &s, vec![]);
    assert_eq!(delta.stats.added_node_count, 0);
    assert_eq!(delta.stats.removed_node_count, 0);
    assert_eq!(delta.stats.added_edge_count, 0);
    assert_eq!(delta.stats.removed_edge_count, 0);

    let result = score(&s, &s);
    assert_eq!(result.total_score, 0.0);
    assert_eq!(result.grade, Grade::A);
    assert!(result.breakdown.iter().all(|m| m.contribution == 0.0));
}

/// Scenario 2: pure growth — 12/14 base nodes/edges, 15/24 head, with 3 new
/// nodes, 10 new edges, 2 of which cross packages.
#[test]
fn pure_growth_scenario() {
    // Base: two packages //shared and //app, 12 nodes wired into 14 edges
    // entirely within a single package (no cross-package deps yet).
    let mut base_nodes = Vec::new();
    let mut base_edges = Vec::new();
    for i in 0..12 {
        base_nodes.push(Node::new(format!("//shared:n{i}"), "rust_library"));
    }
    for i in 0..14 {
        let from = format!("//shared:n{}", i % 12);
        let to = format!("//shared:n{}", (i + 1) % 12);
        base_edges.push(Edge::new(from, to, EdgeType::Compile));
    }
    let base = snap("base", base_nodes.clone(), base_edges.clone());

    // Head: same 12 nodes plus 3 new ones in //app, 10 new edges of which 2
    // cross from //app into //shared (non-external).
    let mut head_nodes = base_nodes.clone();
    head_nodes.push(Node::new("//app:x", "rust_binary"));
    head_nodes.push(Node::new("//app:y", "rust_library"));
    head_nodes.push(Node::new("//app:z", "rust_library"));

    let mut head_edges = base_edges.clone();
    head_edges.push(Edge::new("//app:x", "//app:y", EdgeType::Compile));
    head_edges.push(Edge::new("//app:y", "//app:z", EdgeType::Compile));
    head_edges.push(Edge::new("//app:x", "//shared:n0", EdgeType::Compile)); // cross-package
    head_edges.push(Edge::new("//app:y", "//shared:n1", EdgeType::Compile)); // cross-package
    for i in 0..6 {
        head_edges.push(Edge::new(
            format!("//shared:n{i}"),
            format!("//shared:n{}", (i + 5) % 12),
            EdgeType::Runtime,
        ));
    }
    let head = snap("head", head_nodes, head_edges);

    let delta = compute_delta(&base, &head, vec![]);
    assert_eq!(delta.stats.added_node_count, 3);
    assert_eq!(delta.stats.added_edge_count, 10);

    let result = score(&base, &head);
    let cross_package = result
        .breakdown
        .iter()
        .find(|m| m.key == "cross_package_deps")
        .unwrap();
    assert!(cross_package.contribution >= 1.0);
    assert!(matches!(result.grade, Grade::B | Grade::C));
}

/// Scenario 3: pure cleanup — 2 nodes / 1 edge removed entirely.
#[test]
fn pure_cleanup_scenario() {
    let base = snap(
        "base",
        vec![Node::new("//a:a", "rust_library"), Node::new("//b:b", "rust_library")],
        vec![Edge::new("//a:a", "//b:b", EdgeType::Compile)],
    );
    let head = snap("head", vec![], vec![]);

    let delta = compute_delta(&base, &head, vec![]);
    assert_eq!(delta.stats.removed_node_count, 2);
    assert_eq!(delta.stats.removed_edge_count, 1);

    let result = score(&base, &head);
    let cleanup = result
        .breakdown
        .iter()
        .find(|m| m.key == "cleanup_credits")
        .unwrap();
    assert_eq!(cleanup.contribution, -2.5);
    assert!(result.total_score <= 0.0);
    assert_eq!(result.grade, Grade::A);
}

/// Scenario 4: a node crosses the hub in-degree threshold (18 -> 22).
#[test]
fn hub_crossing_threshold_scenario() {
    let mut nodes = vec![Node::new("//p:x", "rust_library")];
    for i in 0..22 {
        nodes.push(Node::new(format!("//p:dep{i}"), "rust_library"));
    }

    let base_edges: Vec<Edge> = (0..18)
        .map(|i| Edge::new(format!("//p:dep{i}"), "//p:x", EdgeType::Compile))
        .collect();
    let head_edges: Vec<Edge> = (0..22)
        .map(|i| Edge::new(format!("//p:dep{i}"), "//p:x", EdgeType::Compile))
        .collect();

    let base = snap("base", nodes.clone(), base_edges);
    let head = snap("head", nodes, head_edges);

    let result = score(&base, &head);
    let hub = result.breakdown.iter().find(|m| m.key == "hub_growth").unwrap();
    assert_eq!(hub.severity, toposcope::models::score::Severity::High);
    assert!(result.hotspots.iter().any(|h| h.node_key == "//p:x"));
}

/// Scenario 5: a newly added non-test node has no test covering it.
#[test]
fn test_debt_scenario() {
    let base = snap("base", vec![], vec![]);
    let head = snap("head", vec![Node::new("//lib/m:m", "rust_library")], vec![]);

    let result = score(&base, &head);
    let test_debt = result.breakdown.iter().find(|m| m.key == "test_debt").unwrap();
    assert_eq!(test_debt.evidence.len(), 1);
    assert_eq!(test_debt.evidence[0].from.as_deref(), Some("//lib/m:m"));
}

/// Scenario 6: a dirty working tree is rejected before any checkout happens,
/// as long as the requested SHAs aren't both already checked out.
#[test]
fn dirty_tree_rejection_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path();

    for args in [
        vec!["init", "--quiet"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "Test"],
    ] {
        Command::new("git").args(&args).current_dir(repo).status().unwrap();
    }
    std::fs::write(repo.join("WORKSPACE"), "").unwrap();
    Command::new("git").args(["add", "."]).current_dir(repo).status().unwrap();
    Command::new("git")
        .args(["commit", "--quiet", "-m", "initial"])
        .current_dir(repo)
        .status()
        .unwrap();
    let head_sha = git_ops::resolve_ref(repo, "HEAD").unwrap();

    std::fs::write(repo.join("WORKSPACE"), "dirty").unwrap();

    // head == base == current HEAD: no checkout would be required, so a
    // dirty tree is tolerated.
    assert!(git_ops::ensure_safe_to_checkout(repo, &head_sha, &head_sha, &head_sha).is_ok());

    // base differs from current HEAD: a checkout would be required, so the
    // dirty tree must be rejected before anything mutates the workspace.
    let err = git_ops::ensure_safe_to_checkout(repo, "0000000000000000000000000000000000000000", &head_sha, &head_sha)
        .unwrap_err();
    assert!(matches!(
        err,
        toposcope::models::error::ToposcopeError::WorkingTreeDirty { .. }
    ));
}
