//! Aggregates metric results into a graded, evidence-bearing `ScoreResult`.

use super::metric::Metric;
use crate::models::delta::Delta;
use crate::models::graph::Snapshot;
use crate::models::score::{
    DeltaStatsSummary, Grade, Hotspot, MetricResult, ScoreResult, Severity, SuggestedAction,
};
use rustc_hash::FxHashMap;

/// Hotspots are emitted for nodes referenced by at least two metrics, or by
/// one metric at `HIGH` severity; capped at the top 10 by contribution.
pub const HOTSPOT_MIN_METRIC_COUNT: usize = 2;
pub const HOTSPOT_CAP: usize = 10;
pub const SUGGESTED_ACTION_CAP: usize = 5;

pub struct ScoringEngine {
    metrics: Vec<Box<dyn Metric>>,
}

impl ScoringEngine {
    pub fn new(metrics: Vec<Box<dyn Metric>>) -> Self {
        Self { metrics }
    }

    /// Runs every metric in configuration order and aggregates the result.
    /// A metric that panics is not caught here — callers that need per-metric
    /// fault isolation should wrap `evaluate` with `catch_unwind` themselves;
    /// in this crate metrics are pure functions over immutable inputs with no
    /// IO, so failures are defects rather than expected outcomes.
    pub fn score(&self, delta: &Delta, base: &Snapshot, head: &Snapshot) -> ScoreResult {
        let breakdown: Vec<MetricResult> = self
            .metrics
            .iter()
            .map(|m| m.evaluate(delta, base, head))
            .collect();

        let has_credit = breakdown.iter().any(|r| r.contribution < 0.0);
        let raw_total: f64 = breakdown.iter().map(|r| r.contribution).sum();
        let total_score = if has_credit { raw_total } else { raw_total.max(0.0) };

        let grade = Grade::from_total(total_score);
        let hotspots = synthesize_hotspots(&breakdown);
        let suggested_actions = synthesize_suggested_actions(&breakdown, &hotspots);

        ScoreResult {
            total_score,
            grade,
            delta_stats: DeltaStatsSummary {
                added_node_count: delta.stats.added_node_count,
                removed_node_count: delta.stats.removed_node_count,
                added_edge_count: delta.stats.added_edge_count,
                removed_edge_count: delta.stats.removed_edge_count,
            },
            breakdown,
            hotspots,
            suggested_actions,
            base_commit: delta.base_commit.clone(),
            head_commit: delta.head_commit.clone(),
        }
    }
}

struct HotspotAccumulator {
    metric_keys: Vec<String>,
    contribution: f64,
    max_severity: Severity,
}

fn synthesize_hotspots(breakdown: &[MetricResult]) -> Vec<Hotspot> {
    let mut by_node: FxHashMap<String, HotspotAccumulator> = FxHashMap::default();

    for result in breakdown {
        for evidence in &result.evidence {
            for node_key in [&evidence.from, &evidence.to].into_iter().flatten() {
                let entry = by_node.entry(node_key.clone()).or_insert(HotspotAccumulator {
                    metric_keys: Vec::new(),
                    contribution: 0.0,
                    max_severity: Severity::Info,
                });
                if !entry.metric_keys.contains(&result.key) {
                    entry.metric_keys.push(result.key.clone());
                }
                entry.contribution += result.contribution;
                entry.max_severity = entry.max_severity.max(result.severity);
            }
        }
    }

    let mut hotspots: Vec<Hotspot> = by_node
        .into_iter()
        .filter(|(_, acc)| {
            acc.metric_keys.len() >= HOTSPOT_MIN_METRIC_COUNT || acc.max_severity == Severity::High
        })
        .map(|(node_key, acc)| Hotspot {
            node_key,
            metric_keys: acc.metric_keys,
            contribution: acc.contribution,
        })
        .collect();

    hotspots.sort_by(|a, b| {
        b.contribution
            .partial_cmp(&a.contribution)
            .unwrap()
            .then_with(|| a.node_key.cmp(&b.node_key))
    });
    hotspots.truncate(HOTSPOT_CAP);
    hotspots
}

fn synthesize_suggested_actions(
    breakdown: &[MetricResult],
    hotspots: &[Hotspot],
) -> Vec<SuggestedAction> {
    let mut actions = Vec::new();

    let has_metric = |key: &str| breakdown.iter().any(|r| r.key == key && !r.evidence.is_empty());

    for hotspot in hotspots {
        let metrics: Vec<&str> = hotspot.metric_keys.iter().map(|k| k.as_str()).collect();

        if metrics.contains(&"fanout_increase") && metrics.contains(&"cross_package_deps") {
            actions.push(SuggestedAction {
                summary: format!("consider splitting {}", hotspot.node_key),
                node_keys: vec![hotspot.node_key.clone()],
            });
        } else if metrics.contains(&"hub_growth") {
            actions.push(SuggestedAction {
                summary: format!(
                    "{} is becoming a hub dependency; review its consumers before it grows further",
                    hotspot.node_key
                ),
                node_keys: vec![hotspot.node_key.clone()],
            });
        }
    }

    if has_metric("test_debt") {
        let untested: Vec<String> = breakdown
            .iter()
            .find(|r| r.key == "test_debt")
            .map(|r| r.evidence.iter().filter_map(|e| e.from.clone()).collect())
            .unwrap_or_default();
        if !untested.is_empty() {
            actions.push(SuggestedAction {
                summary: "add test coverage for newly added targets".to_string(),
                node_keys: untested,
            });
        }
    }

    if has_metric("cleanup_credits") {
        actions.push(SuggestedAction {
            summary: "nice cleanup — consider documenting the removed dependency in the changelog"
                .to_string(),
            node_keys: Vec::new(),
        });
    }

    actions.truncate(SUGGESTED_ACTION_CAP);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::{Edge, EdgeType, Node};
    use crate::services::scoring::metrics::default_metrics;

    fn snap(commit: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Snapshot {
        Snapshot::build(commit, None, false, vec![], nodes, edges, 0, chrono::Utc::now())
    }

    #[test]
    fn empty_diff_yields_grade_a_and_zero_total() {
        let snap = snap("a", vec![Node::new("//a:a", "rust_library")], vec![]);
        let delta = crate::services::delta::compute_delta(&snap, &snap, vec![]);
        let engine = ScoringEngine::new(default_metrics());
        let result = engine.score(&delta, &snap, &snap);
        assert_eq!(result.total_score, 0.0);
        assert_eq!(result.grade, Grade::A);
    }

    #[test]
    fn pure_cleanup_grades_a_with_nonpositive_total() {
        let base = snap(
            "a",
            vec![Node::new("//a:a", "rust_library"), Node::new("//b:b", "rust_library")],
            vec![Edge::new("//a:a", "//b:b", EdgeType::Compile)],
        );
        let head = snap("b", vec![], vec![]);
        let delta = crate::services::delta::compute_delta(&base, &head, vec![]);
        let engine = ScoringEngine::new(default_metrics());
        let result = engine.score(&delta, &base, &head);
        assert!(result.total_score <= 0.0);
        assert_eq!(result.grade, Grade::A);
    }

    #[test]
    fn sum_of_contributions_equals_total_when_no_credit_fires() {
        let base = snap("a", vec![], vec![]);
        let head = snap(
            "b",
            vec![Node::new("//app:a", "rust_library"), Node::new("//lib:b", "rust_library")],
            vec![Edge::new("//app:a", "//lib:b", EdgeType::Compile)],
        );
        let delta = crate::services::delta::compute_delta(&base, &head, vec![]);
        let engine = ScoringEngine::new(default_metrics());
        let result = engine.score(&delta, &base, &head);
        let sum: f64 = result.breakdown.iter().map(|r| r.contribution).sum();
        assert_eq!(result.total_score, sum.max(0.0));
    }

    #[test]
    fn hotspot_metric_keys_are_subset_of_contributing_metrics() {
        let base = snap("a", vec![], vec![]);
        let head = snap(
            "b",
            vec![Node::new("//app:a", "rust_library"), Node::new("//lib:b", "rust_library")],
            vec![Edge::new("//app:a", "//lib:b", EdgeType::Compile)],
        );
        let delta = crate::services::delta::compute_delta(&base, &head, vec![]);
        let engine = ScoringEngine::new(default_metrics());
        let result = engine.score(&delta, &base, &head);
        let known_keys: Vec<&str> = result.breakdown.iter().map(|r| r.key.as_str()).collect();
        for hotspot in &result.hotspots {
            for key in &hotspot.metric_keys {
                assert!(known_keys.contains(&key.as_str()));
            }
        }
    }
}
