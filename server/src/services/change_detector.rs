//! Optional collaborator that names the set of targets affected between two
//! commits, per an external hash-diff helper. Never required for
//! correctness: the orchestrator downgrades a failure here to a warning and
//! proceeds with an empty `impacted_targets` list.

use crate::models::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub struct ChangeDetectionRequest<'a> {
    pub repo_path: &'a Path,
    pub base_sha: &'a str,
    pub head_sha: &'a str,
    pub bazel_path: &'a str,
    pub cache_dir: &'a Path,
}

#[derive(Debug, Clone)]
pub struct ChangeDetectionResult {
    pub impacted_targets: Vec<String>,
    pub base_hash_file: PathBuf,
    pub head_hash_file: PathBuf,
    pub duration: Duration,
}

/// Small trait at this integration seam so the orchestrator can be tested
/// against a substitute that never shells out, mirroring the strategy-object
/// pattern used for the cache layer.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    async fn detect_changes(
        &self,
        req: ChangeDetectionRequest<'_>,
    ) -> Result<ChangeDetectionResult>;
}

/// Production implementation: shells out to a `bazel-diff`-style jar twice
/// (once per SHA, to produce per-target hash files) and once more to diff
/// them.
pub struct BazelDiffChangeDetector {
    jar_path: PathBuf,
    timeout: Duration,
}

/// Runs `cmd`, force-killing it if it outlives `timeout` — spec §5 "Change
/// detection inherits the same [per-invocation] timeout" as extraction.
async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    label: &str,
    timeout: Duration,
) -> Result<std::process::Output> {
    cmd.kill_on_drop(true);
    let child = cmd.spawn()?;
    let start = std::time::Instant::now();
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(crate::models::error::ToposcopeError::DeadlineExceeded {
            operation: label.to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

impl BazelDiffChangeDetector {
    pub fn new(jar_path: PathBuf) -> Self {
        Self {
            jar_path,
            timeout: Duration::from_secs(crate::models::config::DEFAULT_EXTRACTION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn generate_hashes(
        &self,
        repo_path: &Path,
        bazel_path: &str,
        sha: &str,
        out_file: &Path,
    ) -> Result<()> {
        let mut cmd = tokio::process::Command::new("java");
        cmd.args([
            "-jar",
            &self.jar_path.to_string_lossy(),
            "generate-hashes",
            "-w",
            &repo_path.to_string_lossy(),
            "-b",
            bazel_path,
            "-o",
            &out_file.to_string_lossy(),
        ]);
        let output = run_with_timeout(
            cmd,
            &format!("bazel-diff generate-hashes ({sha})"),
            self.timeout,
        )
        .await?;
        if !output.status.success() {
            return Err(crate::models::error::ToposcopeError::SubprocessFailed {
                command: format!("java -jar bazel-diff generate-hashes ({sha})"),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeDetector for BazelDiffChangeDetector {
    async fn detect_changes(
        &self,
        req: ChangeDetectionRequest<'_>,
    ) -> Result<ChangeDetectionResult> {
        let start = std::time::Instant::now();
        let base_hash_file = req.cache_dir.join(format!("hashes/{}.txt", req.base_sha));
        let head_hash_file = req.cache_dir.join(format!("hashes/{}.txt", req.head_sha));
        if let Some(parent) = base_hash_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.generate_hashes(req.repo_path, req.bazel_path, req.base_sha, &base_hash_file)
            .await?;
        self.generate_hashes(req.repo_path, req.bazel_path, req.head_sha, &head_hash_file)
            .await?;

        let mut cmd = tokio::process::Command::new("java");
        cmd.args([
            "-jar",
            &self.jar_path.to_string_lossy(),
            "get-impacted-targets",
            "-sh",
            &base_hash_file.to_string_lossy(),
            "-fh",
            &head_hash_file.to_string_lossy(),
        ]);
        let output =
            run_with_timeout(cmd, "bazel-diff get-impacted-targets", self.timeout).await?;
        if !output.status.success() {
            return Err(crate::models::error::ToposcopeError::SubprocessFailed {
                command: "java -jar bazel-diff get-impacted-targets".to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let impacted_targets: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        Ok(ChangeDetectionResult {
            impacted_targets,
            base_hash_file,
            head_hash_file,
            duration: start.elapsed(),
        })
    }
}

/// Always reports "skipped" — used in tests and when no jar is configured.
pub struct NullChangeDetector;

#[async_trait]
impl ChangeDetector for NullChangeDetector {
    async fn detect_changes(
        &self,
        req: ChangeDetectionRequest<'_>,
    ) -> Result<ChangeDetectionResult> {
        Ok(ChangeDetectionResult {
            impacted_targets: Vec::new(),
            base_hash_file: req.cache_dir.join(format!("hashes/{}.txt", req.base_sha)),
            head_hash_file: req.cache_dir.join(format!("hashes/{}.txt", req.head_sha)),
            duration: Duration::default(),
        })
    }
}

/// Runs `detector`, downgrading any failure to a warning and an empty
/// result — change detection is never fatal to the pipeline.
pub async fn detect_changes_best_effort(
    detector: &dyn ChangeDetector,
    req: ChangeDetectionRequest<'_>,
) -> ChangeDetectionResult {
    let cache_dir = req.cache_dir.to_path_buf();
    let base_sha = req.base_sha.to_string();
    let head_sha = req.head_sha.to_string();
    match detector.detect_changes(req).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "change detection failed, continuing without impacted targets");
            ChangeDetectionResult {
                impacted_targets: Vec::new(),
                base_hash_file: cache_dir.join(format!("hashes/{base_sha}.txt")),
                head_hash_file: cache_dir.join(format!("hashes/{head_sha}.txt")),
                duration: Duration::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_detector_always_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let detector = NullChangeDetector;
        let req = ChangeDetectionRequest {
            repo_path: dir.path(),
            base_sha: "aaa",
            head_sha: "bbb",
            bazel_path: "bazel",
            cache_dir: dir.path(),
        };
        let result = detector.detect_changes(req).await.unwrap();
        assert!(result.impacted_targets.is_empty());
    }

    #[tokio::test]
    async fn run_with_timeout_kills_and_reports_deadline_exceeded() {
        let mut cmd = tokio::process::Command::new("sleep");
        cmd.arg("5");
        let err = run_with_timeout(cmd, "sleep 5", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::models::error::ToposcopeError::DeadlineExceeded { .. }
        ));
    }

    #[tokio::test]
    async fn best_effort_downgrades_failure_to_empty_result() {
        struct AlwaysFails;
        #[async_trait]
        impl ChangeDetector for AlwaysFails {
            async fn detect_changes(
                &self,
                _req: ChangeDetectionRequest<'_>,
            ) -> Result<ChangeDetectionResult> {
                Err(crate::models::error::ToposcopeError::ConfigError("no jar".into()))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let req = ChangeDetectionRequest {
            repo_path: dir.path(),
            base_sha: "aaa",
            head_sha: "bbb",
            bazel_path: "bazel",
            cache_dir: dir.path(),
        };
        let result = detect_changes_best_effort(&AlwaysFails, req).await;
        assert!(result.impacted_targets.is_empty());
    }
}
