//! Resolves refs, manages checkouts, and runs change detection, extraction,
//! delta computation, and scoring in order, always restoring the original
//! ref on exit.

use crate::models::config::ToposcopeConfig;
use crate::models::delta::Delta;
use crate::models::error::Result;
use crate::models::score::ScoreResult;
use crate::services::cache::SnapshotCache;
use crate::services::change_detector::{
    detect_changes_best_effort, ChangeDetectionRequest, ChangeDetector, NullChangeDetector,
};
use crate::services::extractor::{self, ExtractorConfig};
use crate::services::git_ops::{self, RefGuard};
use crate::services::scoring::{default_metrics, ScoringEngine};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct PipelineRequest<'a> {
    pub workspace: &'a Path,
    pub base_ref: &'a str,
    pub head_ref: &'a str,
}

pub struct PipelineOutput {
    pub delta: Delta,
    pub score: ScoreResult,
}

/// Per-workspace exclusive lock: concurrent pipelines against the same
/// checkout are unsafe (both may issue checkouts) and must be rejected by
/// serializing on this mutex.
pub struct Orchestrator {
    config: ToposcopeConfig,
    workspace_locks: Mutex<std::collections::HashMap<std::path::PathBuf, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(config: ToposcopeConfig) -> Self {
        Self {
            config,
            workspace_locks: Mutex::new(std::collections::HashMap::new()),
        }
    }

    async fn lock_for(&self, workspace: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.workspace_locks.lock().await;
        locks
            .entry(workspace.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn run(&self, req: PipelineRequest<'_>) -> Result<PipelineOutput> {
        let workspace_lock = self.lock_for(req.workspace).await;
        let _guard = workspace_lock.lock().await;

        let base_sha = git_ops::resolve_ref(req.workspace, req.base_ref)?;
        let head_sha = git_ops::resolve_ref(req.workspace, req.head_ref)?;
        let current_sha = git_ops::resolve_ref(req.workspace, "HEAD")?;
        let original_ref = git_ops::current_symbolic_ref_or_sha(req.workspace)?;

        git_ops::ensure_safe_to_checkout(req.workspace, &base_sha, &head_sha, &current_sha)?;

        let mut ref_guard = RefGuard::new(req.workspace, original_ref);

        let result = self.run_inner(req.workspace, &base_sha, &head_sha).await;

        if result.is_ok() && base_sha == current_sha && head_sha == current_sha {
            ref_guard.disarm();
        }

        result
    }

    async fn run_inner(
        &self,
        workspace: &Path,
        base_sha: &str,
        head_sha: &str,
    ) -> Result<PipelineOutput> {
        let cache = SnapshotCache::new(&self.config.cache_dir);
        let extractor_config = ExtractorConfig {
            bazel_path: self.config.bazel_path.clone(),
            bazelrc: self.config.bazelrc.clone(),
            use_cquery: self.config.use_cquery,
            timeout: std::time::Duration::from_secs(self.config.extraction_timeout_secs),
            max_query_chunk_len: self.config.max_query_chunk_len,
        };

        let change_detector: Box<dyn ChangeDetector> = match &self.config.bazel_diff_jar {
            Some(jar) => Box::new(
                crate::services::change_detector::BazelDiffChangeDetector::new(jar.clone())
                    .with_timeout(extractor_config.timeout),
            ),
            None => Box::new(NullChangeDetector),
        };

        let change_req = ChangeDetectionRequest {
            repo_path: workspace,
            base_sha,
            head_sha,
            bazel_path: &self.config.bazel_path,
            cache_dir: &self.config.cache_dir,
        };

        let (change_result, base_snapshot) = tokio::join!(
            detect_changes_best_effort(change_detector.as_ref(), change_req),
            self.fetch_snapshot(&cache, workspace, base_sha, &extractor_config),
        );
        let base_snapshot = base_snapshot?;
        let head_snapshot = self
            .fetch_snapshot(&cache, workspace, head_sha, &extractor_config)
            .await?;

        let delta = crate::services::delta::compute_delta(
            &base_snapshot,
            &head_snapshot,
            change_result.impacted_targets,
        );

        let engine = ScoringEngine::new(default_metrics());
        let score = engine.score(&delta, &base_snapshot, &head_snapshot);

        let score_path = cache.score_path(base_sha, head_sha);
        if let Err(e) = crate::models::persistence::save_score(&score_path, &score) {
            tracing::warn!(error = %e, "failed to persist score to cache");
        }

        info!(
            base = %base_sha,
            head = %head_sha,
            grade = %score.grade,
            total_score = score.total_score,
            cache_hit_rate = cache.stats().hit_rate(),
            "pipeline run complete"
        );

        Ok(PipelineOutput { delta, score })
    }

    /// Loads `sha`'s snapshot from cache, or checks it out and extracts it.
    async fn fetch_snapshot(
        &self,
        cache: &SnapshotCache,
        workspace: &Path,
        sha: &str,
        extractor_config: &ExtractorConfig,
    ) -> Result<crate::models::graph::Snapshot> {
        cache
            .get_or_extract(sha, || async {
                git_ops::checkout(workspace, sha)?;
                let branch = git_ops::current_symbolic_ref_or_sha(workspace).ok();
                extractor::extract_full(workspace, sha, branch, extractor_config).await
            })
            .await
    }
}
