//! The build-dependency graph data model (spec §3, §4.1).

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed dependency edge's kind, derived from the bazel attribute list
/// it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Compile,
    Runtime,
    Toolchain,
    Data,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Compile => "COMPILE",
            EdgeType::Runtime => "RUNTIME",
            EdgeType::Toolchain => "TOOLCHAIN",
            EdgeType::Data => "DATA",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical label, e.g. `//app/foo:lib`. Unique within a snapshot.
    pub key: String,
    /// Rule class string, e.g. `rust_library`.
    pub kind: String,
    /// Enclosing package label, the prefix of `key` up to but excluding `:`.
    pub package: String,
    pub tags: Vec<String>,
    pub visibility: Vec<String>,
    pub is_test: bool,
    pub is_external: bool,
}

impl Node {
    pub fn new(key: impl Into<String>, kind: impl Into<String>) -> Self {
        let key = key.into();
        let package = label_to_package(&key).to_string();
        let is_external = key.starts_with('@');
        let kind = kind.into();
        let is_test = rule_class_is_test(&kind);
        Self {
            key,
            kind,
            package,
            tags: Vec::new(),
            visibility: Vec::new(),
            is_test,
            is_external,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_visibility(mut self, visibility: Vec<String>) -> Self {
        self.visibility = visibility;
        self
    }
}

/// `isTest` is derived from the rule class per spec §4.2 point 3.
pub fn rule_class_is_test(rule_class: &str) -> bool {
    rule_class.ends_with("_test") || rule_class.ends_with("_tests") || rule_class == "test_suite"
}

/// A directed dependency. Identity is the triple `(from, to, type)`;
/// self-loops are permitted but never synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type,
        }
    }
}

/// Stable serialization of an edge's identity triple, used for set
/// operations and as the key into hotspot/evidence aggregation.
///
/// NUL-joined rather than `:`-joined: labels already contain `:` as the
/// package/name separator, so a naive `from:to:type` join could collide
/// between distinct edges if a label's package segment ever embedded one.
pub fn edge_key(edge: &Edge) -> String {
    format!("{}\u{0}{}\u{0}{}", edge.from, edge.to, edge.edge_type)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub package_count: usize,
    pub extraction_ms: u64,
}

/// An immutable record of the full (or scoped) build graph at one commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub commit_sha: String,
    pub branch: Option<String>,
    pub partial: bool,
    pub scope: Vec<String>,
    pub nodes: FxHashMap<String, Node>,
    pub edges: Vec<Edge>,
    pub stats: SnapshotStats,
    pub extracted_at: chrono::DateTime<chrono::Utc>,
}

impl Snapshot {
    /// Builds a snapshot from its nodes and edges, de-duplicating edges on
    /// their identity triple and computing `stats` from the result (spec
    /// §3 invariants).
    pub fn build(
        commit_sha: impl Into<String>,
        branch: Option<String>,
        partial: bool,
        scope: Vec<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        extraction_ms: u64,
        extracted_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let mut node_map: FxHashMap<String, Node> = FxHashMap::default();
        for node in nodes {
            node_map.insert(node.key.clone(), node);
        }

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut deduped_edges = Vec::new();
        for edge in edges {
            let k = edge_key(&edge);
            if seen.insert(k) {
                deduped_edges.push(edge);
            }
        }

        let package_count = packages_of(&node_map).len();
        let stats = SnapshotStats {
            node_count: node_map.len(),
            edge_count: deduped_edges.len(),
            package_count,
            extraction_ms,
        };

        Self {
            id: Uuid::new_v4(),
            commit_sha: commit_sha.into(),
            branch,
            partial,
            scope,
            nodes: node_map,
            edges: deduped_edges,
            stats,
            extracted_at,
        }
    }
}

fn packages_of(nodes: &FxHashMap<String, Node>) -> FxHashSet<String> {
    nodes
        .values()
        .map(|n| n.package.clone())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Set of non-empty package labels present in the snapshot.
pub fn packages(snapshot: &Snapshot) -> FxHashSet<String> {
    packages_of(&snapshot.nodes)
}

/// Initializes every known node to 0, then counts edges by `to`. Edges whose
/// endpoints are missing from `nodes` (partial snapshots) do not create
/// phantom entries.
pub fn compute_in_degrees(snapshot: &Snapshot) -> FxHashMap<String, u32> {
    let mut degrees: FxHashMap<String, u32> = snapshot.nodes.keys().map(|k| (k.clone(), 0)).collect();
    for edge in &snapshot.edges {
        if let Some(d) = degrees.get_mut(&edge.to) {
            *d += 1;
        }
    }
    degrees
}

/// Symmetric to [`compute_in_degrees`].
pub fn compute_out_degrees(snapshot: &Snapshot) -> FxHashMap<String, u32> {
    let mut degrees: FxHashMap<String, u32> = snapshot.nodes.keys().map(|k| (k.clone(), 0)).collect();
    for edge in &snapshot.edges {
        if let Some(d) = degrees.get_mut(&edge.from) {
            *d += 1;
        }
    }
    degrees
}

/// Trims surrounding whitespace, strips a leading `@` when followed by
/// `//`, and drops a trailing `:X` suffix when `X` equals the final path
/// segment before `:` (canonical short form). Spec §4.2 "Label
/// normalization" and §8 testable properties.
pub fn normalize_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = if let Some(rest) = trimmed.strip_prefix('@') {
        if rest.starts_with("//") {
            rest
        } else {
            trimmed
        }
    } else {
        trimmed
    };

    match trimmed.rsplit_once(':') {
        Some((path, name)) => {
            let last_segment = path.rsplit('/').next().unwrap_or(path);
            if last_segment == name {
                path.to_string()
            } else {
                trimmed.to_string()
            }
        }
        None => trimmed.to_string(),
    }
}

/// The substring before `:`, else the label itself.
pub fn label_to_package(label: &str) -> &str {
    label.split_once(':').map(|(pkg, _)| pkg).unwrap_or(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_whitespace() {
        assert_eq!(normalize_label("  //app/foo:lib  "), "//app/foo:lib");
    }

    #[test]
    fn normalize_strips_external_prefix() {
        assert_eq!(normalize_label("@//app/foo:foo"), "//app/foo");
    }

    #[test]
    fn normalize_drops_canonical_short_suffix() {
        assert_eq!(normalize_label("//lib/bar:bar"), "//lib/bar");
    }

    #[test]
    fn normalize_keeps_distinct_target_name() {
        assert_eq!(normalize_label("//app/foo:lib"), "//app/foo:lib");
    }

    #[test]
    fn label_to_package_strips_target() {
        assert_eq!(label_to_package("//app/foo:lib"), "//app/foo");
        assert_eq!(label_to_package("//app/foo"), "//app/foo");
    }

    #[test]
    fn in_degrees_ignore_dangling_endpoints_in_partial_snapshots() {
        let snap = Snapshot::build(
            "deadbeef",
            None,
            true,
            vec!["//app:main".to_string()],
            vec![Node::new("//app:main", "rust_binary")],
            vec![Edge::new("//app:main", "//lib:missing", EdgeType::Compile)],
            0,
            chrono::Utc::now(),
        );
        let degrees = compute_in_degrees(&snap);
        assert_eq!(degrees.len(), 1);
        assert_eq!(degrees.get("//app:main"), Some(&0));
        assert!(!degrees.contains_key("//lib:missing"));
    }

    #[test]
    fn duplicate_edges_are_eliminated_on_ingestion() {
        let snap = Snapshot::build(
            "sha",
            None,
            false,
            vec![],
            vec![
                Node::new("//a:a", "rust_library"),
                Node::new("//b:b", "rust_library"),
            ],
            vec![
                Edge::new("//a:a", "//b:b", EdgeType::Compile),
                Edge::new("//a:a", "//b:b", EdgeType::Compile),
            ],
            0,
            chrono::Utc::now(),
        );
        assert_eq!(snap.edges.len(), 1);
        assert_eq!(snap.stats.edge_count, 1);
    }

    #[test]
    fn is_test_detection() {
        assert!(rule_class_is_test("rust_test"));
        assert!(rule_class_is_test("go_tests"));
        assert!(rule_class_is_test("test_suite"));
        assert!(!rule_class_is_test("rust_library"));
    }
}
