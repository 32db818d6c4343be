use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the toposcope pipeline.
///
/// Each variant corresponds to one entry in the error taxonomy: config and
/// working-tree errors are fatal before any mutation happens, subprocess and
/// parse errors are fatal for extraction, cache errors are logged and
/// downgraded to an in-memory fallback at the call site, and deadline /
/// invariant errors always propagate.
#[derive(Error, Debug)]
pub enum ToposcopeError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("working tree is dirty at {path}: {detail}")]
    WorkingTreeDirty { path: PathBuf, detail: String },

    #[error("subprocess `{command}` failed (exit {exit_code:?}): {stderr}")]
    SubprocessFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse {what}: {message}")]
    ParseError { what: String, message: String },

    #[error("cache operation failed: {0}")]
    CacheError(String),

    #[error("deadline exceeded after {elapsed_ms}ms running {operation}")]
    DeadlineExceeded { operation: String, elapsed_ms: u64 },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ToposcopeError {
    /// Maps an error to the CLI exit-code convention from §6: 0 success,
    /// 1 user/config error, ≥2 internal failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToposcopeError::ConfigError(_) | ToposcopeError::WorkingTreeDirty { .. } => 1,
            _ => 2,
        }
    }

    /// Whether this error should be treated as a non-fatal, log-and-continue
    /// condition by its call site (only the cache layer qualifies; every
    /// other variant aborts the stage that raised it).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ToposcopeError::CacheError(_))
    }
}

pub type Result<T> = std::result::Result<T, ToposcopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_dirty_tree_exit_one() {
        assert_eq!(ToposcopeError::ConfigError("x".into()).exit_code(), 1);
        assert_eq!(
            ToposcopeError::WorkingTreeDirty {
                path: PathBuf::from("/repo"),
                detail: "uncommitted changes".into(),
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn everything_else_exits_two() {
        assert_eq!(
            ToposcopeError::InvariantViolation("x".into()).exit_code(),
            2
        );
        assert_eq!(
            ToposcopeError::SubprocessFailed {
                command: "bazel".into(),
                exit_code: Some(1),
                stderr: String::new(),
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn only_cache_errors_are_recoverable() {
        assert!(ToposcopeError::CacheError("x".into()).is_recoverable());
        assert!(!ToposcopeError::InvariantViolation("x".into()).is_recoverable());
    }
}
