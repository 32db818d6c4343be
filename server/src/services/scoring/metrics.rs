//! The required metric battery: `cross_package_deps`, `fanout_increase`,
//! `hub_growth`, `test_debt`, `cleanup_credits`.

use super::metric::Metric;
use crate::models::delta::Delta;
use crate::models::graph::{compute_in_degrees, compute_out_degrees, Snapshot};
use crate::models::score::{EvidenceItem, MetricResult, Severity};

pub const CROSS_PACKAGE_MEDIUM_THRESHOLD: usize = 3;
pub const CROSS_PACKAGE_HIGH_THRESHOLD: usize = 8;
pub const FANOUT_INCREASE_SEVERITY_THRESHOLD: u32 = 5;
pub const FANOUT_RAW_SCORE_WEIGHT: f64 = 0.5;
pub const HUB_INDEGREE_THRESHOLD: u32 = 20;
pub const CLEANUP_REMOVED_EDGE_WEIGHT: f64 = 0.5;

/// Counts added edges crossing package boundaries toward a non-external
/// target.
pub struct CrossPackageDeps;

impl Metric for CrossPackageDeps {
    fn key(&self) -> &str {
        "cross_package_deps"
    }

    fn name(&self) -> &str {
        "Cross-package dependency growth"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, delta: &Delta, _base: &Snapshot, head: &Snapshot) -> MetricResult {
        let mut evidence = Vec::new();
        for edge in &delta.added_edges {
            let from_package = crate::models::graph::label_to_package(&edge.from);
            let to_package = crate::models::graph::label_to_package(&edge.to);
            if from_package == to_package {
                continue;
            }
            let to_is_external = head
                .nodes
                .get(&edge.to)
                .map(|n| n.is_external)
                .unwrap_or_else(|| edge.to.starts_with('@'));
            if to_is_external {
                continue;
            }
            evidence.push(
                EvidenceItem::new("cross_package_dep", format!("{} -> {}", edge.from, edge.to))
                    .with_edge(edge.from.clone(), edge.to.clone()),
            );
        }

        let raw_score = evidence.len();
        let severity = if raw_score >= CROSS_PACKAGE_HIGH_THRESHOLD {
            Severity::High
        } else if raw_score >= CROSS_PACKAGE_MEDIUM_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Info
        };

        MetricResult {
            key: self.key().to_string(),
            name: self.name().to_string(),
            contribution: self.weight() * raw_score as f64,
            severity,
            evidence: crate::models::score::truncate_evidence(evidence),
        }
    }
}

/// Sums positive out-degree growth across nodes present in both snapshots.
pub struct FanoutIncrease;

impl Metric for FanoutIncrease {
    fn key(&self) -> &str {
        "fanout_increase"
    }

    fn name(&self) -> &str {
        "Fanout increase"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, _delta: &Delta, base: &Snapshot, head: &Snapshot) -> MetricResult {
        let base_out = compute_out_degrees(base);
        let head_out = compute_out_degrees(head);

        let mut raw_sum = 0.0f64;
        let mut evidence = Vec::new();
        for (key, head_degree) in &head_out {
            let Some(base_degree) = base_out.get(key) else {
                continue;
            };
            let increase = head_degree.saturating_sub(*base_degree);
            if increase == 0 {
                continue;
            }
            raw_sum += FANOUT_RAW_SCORE_WEIGHT * increase as f64;
            if increase >= FANOUT_INCREASE_SEVERITY_THRESHOLD {
                evidence.push(
                    EvidenceItem::new(
                        "fanout_increase",
                        format!("{key} fanout {base_degree} -> {head_degree} (+{increase})"),
                    )
                    .with_node(key.clone())
                    .with_value(increase as f64),
                );
            }
        }
        evidence.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap());

        let severity = if evidence.is_empty() {
            Severity::Info
        } else {
            Severity::Medium
        };

        MetricResult {
            key: self.key().to_string(),
            name: self.name().to_string(),
            contribution: self.weight() * raw_sum,
            severity,
            evidence: crate::models::score::truncate_evidence(evidence),
        }
    }
}

/// Sums positive in-degree growth for nodes whose head in-degree crosses the
/// hub threshold.
pub struct HubGrowth;

impl Metric for HubGrowth {
    fn key(&self) -> &str {
        "hub_growth"
    }

    fn name(&self) -> &str {
        "Hub growth"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, _delta: &Delta, base: &Snapshot, head: &Snapshot) -> MetricResult {
        let base_in = compute_in_degrees(base);
        let head_in = compute_in_degrees(head);

        let mut raw_sum = 0.0f64;
        let mut evidence = Vec::new();
        for (key, head_degree) in &head_in {
            if *head_degree < HUB_INDEGREE_THRESHOLD {
                continue;
            }
            let base_degree = base_in.get(key).copied().unwrap_or(0);
            let increase = head_degree.saturating_sub(base_degree);
            if increase == 0 {
                continue;
            }
            raw_sum += increase as f64;
            let crossed_threshold = base_degree < HUB_INDEGREE_THRESHOLD;
            evidence.push((
                if crossed_threshold { Severity::High } else { Severity::Medium },
                EvidenceItem::new(
                    "hub_growth",
                    format!("{key} in-degree {base_degree} -> {head_degree} (+{increase})"),
                )
                .with_node(key.clone())
                .with_value(increase as f64),
            ));
        }
        evidence.sort_by(|(_, a), (_, b)| b.value.partial_cmp(&a.value).unwrap());

        let severity = evidence
            .iter()
            .map(|(s, _)| *s)
            .max()
            .unwrap_or(Severity::Info);
        let evidence: Vec<EvidenceItem> = evidence.into_iter().map(|(_, e)| e).collect();

        MetricResult {
            key: self.key().to_string(),
            name: self.name().to_string(),
            contribution: self.weight() * raw_sum,
            severity,
            evidence: crate::models::score::truncate_evidence(evidence),
        }
    }
}

/// Counts added non-test nodes with no reverse dependency from a test node
/// in `head`.
pub struct TestDebt;

impl Metric for TestDebt {
    fn key(&self) -> &str {
        "test_debt"
    }

    fn name(&self) -> &str {
        "Test debt"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, delta: &Delta, _base: &Snapshot, head: &Snapshot) -> MetricResult {
        let mut evidence = Vec::new();
        for node in &delta.added_nodes {
            if node.is_test {
                continue;
            }
            let has_test_reverse_dep = head.edges.iter().any(|e| {
                e.to == node.key
                    && head
                        .nodes
                        .get(&e.from)
                        .map(|from_node| from_node.is_test)
                        .unwrap_or(false)
            });
            if !has_test_reverse_dep {
                evidence.push(
                    EvidenceItem::new("test_debt", format!("{} has no test covering it", node.key))
                        .with_node(node.key.clone()),
                );
            }
        }

        let raw_score = evidence.len();
        let severity = if raw_score > 0 { Severity::Low } else { Severity::Info };

        MetricResult {
            key: self.key().to_string(),
            name: self.name().to_string(),
            contribution: self.weight() * raw_score as f64,
            severity,
            evidence: crate::models::score::truncate_evidence(evidence),
        }
    }
}

/// Always-negative credit for removed structure.
pub struct CleanupCredits;

impl Metric for CleanupCredits {
    fn key(&self) -> &str {
        "cleanup_credits"
    }

    fn name(&self) -> &str {
        "Cleanup credits"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, delta: &Delta, _base: &Snapshot, _head: &Snapshot) -> MetricResult {
        let raw_score = -((delta.removed_nodes.len() as f64)
            + CLEANUP_REMOVED_EDGE_WEIGHT * delta.removed_edges.len() as f64);

        let mut evidence: Vec<EvidenceItem> = delta
            .removed_nodes
            .iter()
            .map(|n| EvidenceItem::new("removed_node", format!("{} removed", n.key)).with_node(n.key.clone()))
            .collect();
        evidence.extend(delta.removed_edges.iter().map(|e| {
            EvidenceItem::new("removed_edge", format!("{} -> {} removed", e.from, e.to))
                .with_edge(e.from.clone(), e.to.clone())
        }));

        MetricResult {
            key: self.key().to_string(),
            name: self.name().to_string(),
            contribution: self.weight() * raw_score,
            severity: Severity::Info,
            evidence: crate::models::score::truncate_evidence(evidence),
        }
    }
}

/// Constructs the default battery in configuration order.
pub fn default_metrics() -> Vec<Box<dyn Metric>> {
    vec![
        Box::new(CrossPackageDeps),
        Box::new(FanoutIncrease),
        Box::new(HubGrowth),
        Box::new(TestDebt),
        Box::new(CleanupCredits),
    ]
}
