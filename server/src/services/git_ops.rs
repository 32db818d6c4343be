//! VCS subprocess wrapper used by the pipeline orchestrator (spec §4.6,
//! §6 "Subprocess contracts" — `git rev-parse`, `git symbolic-ref --short
//! HEAD`, `git status --porcelain`, `git checkout <ref> --quiet`).

use crate::models::error::{Result, ToposcopeError};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

fn run_git(repo_path: &Path, args: &[&str]) -> Result<std::process::Output> {
    debug!(?args, repo = %repo_path.display(), "running git");
    Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .map_err(Into::into)
}

fn command_label(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}

/// Resolves `ref` (branch, tag, or SHA) to a full commit SHA.
pub fn resolve_ref(repo_path: &Path, reference: &str) -> Result<String> {
    let args = ["rev-parse", reference];
    let output = run_git(repo_path, &args)?;
    if !output.status.success() {
        return Err(ToposcopeError::SubprocessFailed {
            command: command_label(&args),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Preferred symbolic ref (e.g. `main`) of HEAD, falling back to the full
/// SHA when HEAD is detached — used to record what to restore to on exit.
pub fn current_symbolic_ref_or_sha(repo_path: &Path) -> Result<String> {
    let symbolic = run_git(repo_path, &["symbolic-ref", "--short", "HEAD"])?;
    if symbolic.status.success() {
        return Ok(String::from_utf8_lossy(&symbolic.stdout).trim().to_string());
    }
    resolve_ref(repo_path, "HEAD")
}

/// `true` when the working tree has no uncommitted changes.
pub fn is_clean(repo_path: &Path) -> Result<bool> {
    let args = ["status", "--porcelain"];
    let output = run_git(repo_path, &args)?;
    if !output.status.success() {
        return Err(ToposcopeError::SubprocessFailed {
            command: command_label(&args),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output.stdout.is_empty())
}

/// Checks out `reference`, quietly.
pub fn checkout(repo_path: &Path, reference: &str) -> Result<()> {
    let args = ["checkout", reference, "--quiet"];
    let output = run_git(repo_path, &args)?;
    if !output.status.success() {
        return Err(ToposcopeError::SubprocessFailed {
            command: command_label(&args),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

/// Verifies the working tree is safe to checkout out of, per spec §4.6 step
/// 3: a dirty tree is only tolerated when both SHAs are already checked out
/// (i.e. `base == head == current HEAD`), since then no checkout is needed.
pub fn ensure_safe_to_checkout(
    repo_path: &Path,
    base_sha: &str,
    head_sha: &str,
    current_sha: &str,
) -> Result<()> {
    if is_clean(repo_path)? {
        return Ok(());
    }
    if base_sha == current_sha && head_sha == current_sha {
        return Ok(());
    }
    Err(ToposcopeError::WorkingTreeDirty {
        path: repo_path.to_path_buf(),
        detail: "commit or stash your changes before running a pipeline that requires a checkout"
            .to_string(),
    })
}

/// RAII guard that restores the working tree to the ref recorded at
/// construction time when dropped, on every exit path (success, error,
/// cancellation, or panic) — spec §9 "Scoped resource release".
///
/// `Drop` cannot be `async`, so the restoring checkout runs via a blocking
/// `std::process::Command` rather than the orchestrator's usual
/// `tokio::process::Command` — acceptable because restoration is a
/// last-ditch, must-not-fail synchronous action taken once per run.
pub struct RefGuard {
    repo_path: std::path::PathBuf,
    original_ref: String,
    disarmed: bool,
}

impl RefGuard {
    /// Records the ref to restore to. Must be constructed before the first
    /// checkout the orchestrator performs.
    pub fn new(repo_path: &Path, original_ref: String) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            original_ref,
            disarmed: false,
        }
    }

    /// Prevents the restoring checkout, e.g. when the caller has already
    /// verified no checkout ever happened.
    pub fn disarm(&mut self) {
        self.disarmed = true;
    }
}

impl Drop for RefGuard {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        if let Err(e) = checkout(&self.repo_path, &self.original_ref) {
            warn!(
                error = %e,
                original_ref = %self.original_ref,
                "failed to restore original ref on exit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn init_repo(dir: &Path) {
        StdCommand::new("git")
            .args(["init", "--quiet"])
            .current_dir(dir)
            .status()
            .unwrap();
        StdCommand::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir)
            .status()
            .unwrap();
        StdCommand::new("git")
            .args(["config", "user.name", "Test"])
            .current_dir(dir)
            .status()
            .unwrap();
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        StdCommand::new("git")
            .args(["add", "."])
            .current_dir(dir)
            .status()
            .unwrap();
        StdCommand::new("git")
            .args(["commit", "--quiet", "-m", "initial"])
            .current_dir(dir)
            .status()
            .unwrap();
    }

    #[test]
    fn clean_tree_reports_clean() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        assert!(is_clean(dir.path()).unwrap());
    }

    #[test]
    fn dirty_tree_is_rejected_unless_both_shas_match_head() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("README.md"), "dirty").unwrap();

        let head = resolve_ref(dir.path(), "HEAD").unwrap();
        assert!(ensure_safe_to_checkout(dir.path(), &head, &head, &head).is_ok());
        assert!(ensure_safe_to_checkout(dir.path(), "deadbeef", &head, &head).is_err());
    }

    #[test]
    fn resolve_ref_returns_full_sha() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let sha = resolve_ref(dir.path(), "HEAD").unwrap();
        assert_eq!(sha.len(), 40);
    }
}
