//! Commit-keyed filesystem cache for snapshots, deltas, and scores. Layout
//! mirrors the external interface contract: `snapshots/<sha>.json`,
//! `deltas/<base>_<head>.json`, `scores/<base>_<head>.json`,
//! `hashes/<sha>.txt`. All writes go through `models::persistence`'s
//! atomic save, so a crash mid-write never leaves a corrupt file visible
//! under the final path.

pub mod stats;

use crate::models::error::{Result, ToposcopeError};
use crate::models::graph::Snapshot;
use crate::models::persistence;
use std::path::{Path, PathBuf};
pub use stats::CacheStats;
use tracing::warn;

pub struct SnapshotCache {
    cache_dir: PathBuf,
    stats: CacheStats,
}

impl SnapshotCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn snapshot_path(&self, commit_sha: &str) -> PathBuf {
        self.cache_dir.join("snapshots").join(format!("{commit_sha}.json"))
    }

    pub fn delta_path(&self, base_sha: &str, head_sha: &str) -> PathBuf {
        self.cache_dir
            .join("deltas")
            .join(format!("{base_sha}_{head_sha}.json"))
    }

    pub fn score_path(&self, base_sha: &str, head_sha: &str) -> PathBuf {
        self.cache_dir
            .join("scores")
            .join(format!("{base_sha}_{head_sha}.json"))
    }

    pub fn hash_path(&self, commit_sha: &str) -> PathBuf {
        self.cache_dir.join("hashes").join(format!("{commit_sha}.txt"))
    }

    /// Loads the cached snapshot for `commit_sha` if present and well-formed.
    /// A cache error (corrupt file, unreadable path) is wrapped as
    /// `CacheError`, confirmed recoverable, and treated as a miss rather than
    /// propagated — `CacheError` is the one taxonomy entry call sites are
    /// allowed to log-and-continue on.
    pub fn load_snapshot(&self, commit_sha: &str) -> Option<Snapshot> {
        let path = self.snapshot_path(commit_sha);
        if !path.exists() {
            self.stats.record_miss();
            return None;
        }
        match persistence::load_snapshot(&path) {
            Ok(snapshot) => {
                self.stats.record_hit();
                Some(snapshot)
            }
            Err(e) => {
                let cache_err = ToposcopeError::CacheError(e.to_string());
                warn!(error = %cache_err, path = %path.display(), "discarding unreadable cached snapshot");
                self.stats.record_miss();
                None
            }
        }
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshot_path(&snapshot.commit_sha);
        persistence::save_snapshot(&path, snapshot)
    }

    /// Returns the cached snapshot for `commit_sha`, or runs `produce` and
    /// caches its result. `produce` is only invoked on a miss.
    pub async fn get_or_extract<F, Fut>(&self, commit_sha: &str, produce: F) -> Result<Snapshot>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Snapshot>>,
    {
        if let Some(snapshot) = self.load_snapshot(commit_sha) {
            return Ok(snapshot);
        }
        let snapshot = produce().await?;
        if let Err(e) = self.save_snapshot(&snapshot) {
            let cache_err = ToposcopeError::CacheError(e.to_string());
            if cache_err.is_recoverable() {
                warn!(error = %cache_err, "failed to persist extracted snapshot to cache");
            } else {
                return Err(cache_err);
            }
        }
        Ok(snapshot)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::Node;

    #[tokio::test]
    async fn get_or_extract_caches_after_first_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let calls = std::sync::atomic::AtomicUsize::new(0);
        let make = || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async {
                Ok(Snapshot::build(
                    "deadbeef",
                    None,
                    false,
                    vec![],
                    vec![Node::new("//a:a", "rust_library")],
                    vec![],
                    0,
                    chrono::Utc::now(),
                ))
            }
        };

        let first = cache.get_or_extract("deadbeef", make).await.unwrap();
        assert_eq!(first.commit_sha, "deadbeef");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let second = cache
            .get_or_extract("deadbeef", || async { panic!("should not re-extract on hit") })
            .await
            .unwrap();
        assert_eq!(second.commit_sha, "deadbeef");
        assert_eq!(cache.stats().hits(), 1);
    }
}
