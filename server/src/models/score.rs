//! Scoring engine output types (spec §3, §4.5).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Letter grade from thresholds on total score (spec §4.5 point 2).
    pub fn from_total(total: f64) -> Self {
        if total < 2.0 {
            Grade::A
        } else if total < 6.0 {
            Grade::B
        } else if total < 12.0 {
            Grade::C
        } else if total < 20.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item of human-readable evidence backing a metric's contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl EvidenceItem {
    pub fn new(kind: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            summary: summary.into(),
            from: None,
            to: None,
            value: None,
        }
    }

    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.from = Some(node.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Evidence items are truncated per metric at this count, with a final
/// synthesized "... and K more" item (spec §4.5 "Evidence construction").
pub const MAX_EVIDENCE_PER_METRIC: usize = 25;

/// Truncates `items` to `MAX_EVIDENCE_PER_METRIC`, appending a summary item
/// for anything dropped.
pub fn truncate_evidence(mut items: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
    if items.len() <= MAX_EVIDENCE_PER_METRIC {
        return items;
    }
    let dropped = items.len() - MAX_EVIDENCE_PER_METRIC;
    items.truncate(MAX_EVIDENCE_PER_METRIC);
    items.push(EvidenceItem::new(
        "truncation",
        format!("... and {dropped} more"),
    ));
    items
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub key: String,
    pub name: String,
    pub contribution: f64,
    pub severity: Severity,
    pub evidence: Vec<EvidenceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub node_key: String,
    pub metric_keys: Vec<String>,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub summary: String,
    pub node_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeltaStatsSummary {
    pub added_node_count: usize,
    pub removed_node_count: usize,
    pub added_edge_count: usize,
    pub removed_edge_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total_score: f64,
    pub grade: Grade,
    pub breakdown: Vec<MetricResult>,
    pub hotspots: Vec<Hotspot>,
    pub suggested_actions: Vec<SuggestedAction>,
    pub delta_stats: DeltaStatsSummary,
    pub base_commit: String,
    pub head_commit: String,
}
