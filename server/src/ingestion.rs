//! Typed contracts for the ingestion service boundary. No HTTP listener is
//! implemented here — the ingestion service is an external collaborator
//! that embeds this crate as a library and owns its own webhook signature
//! verification, blob storage, and relational persistence.

use crate::models::graph::Snapshot;
use crate::models::score::ScoreResult;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/webhooks/github`, prior to signature verification
/// (owned by the ingestion service, not this crate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub repo_full_name: String,
    pub commit_sha: String,
    pub base_sha: Option<String>,
    pub branch: String,
}

/// Body of `POST /internal/process`: the worker posts already-computed
/// results, not a compute-then-respond exchange — one flat body carries the
/// commit identity alongside both snapshots and the score (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub repo_full_name: String,
    pub commit_sha: String,
    pub base_sha: String,
    pub branch: String,
    pub committed_at: chrono::DateTime<chrono::Utc>,
    pub snapshot: Snapshot,
    pub base_snapshot: Snapshot,
    pub score: ScoreResult,
}
