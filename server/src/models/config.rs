//! Extractor/orchestrator configuration (SPEC_FULL.md §6 [ADDED]).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default chunk size for scoped `rdeps` queries, in characters of
/// serialized target-list length (spec §4.2 "Scoped extraction").
pub const DEFAULT_MAX_QUERY_CHUNK_LEN: usize = 100_000;

/// Default per-invocation timeout for extraction and change detection
/// (spec §5 "Timeouts").
pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToposcopeConfig {
    pub bazel_path: String,
    pub bazelrc: Option<PathBuf>,
    pub use_cquery: bool,
    pub cache_dir: PathBuf,
    pub extraction_timeout_secs: u64,
    pub bazel_diff_jar: Option<PathBuf>,
    pub max_query_chunk_len: usize,
}

impl Default for ToposcopeConfig {
    fn default() -> Self {
        Self {
            bazel_path: "bazel".to_string(),
            bazelrc: None,
            use_cquery: false,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("toposcope"),
            extraction_timeout_secs: DEFAULT_EXTRACTION_TIMEOUT_SECS,
            bazel_diff_jar: None,
            max_query_chunk_len: DEFAULT_MAX_QUERY_CHUNK_LEN,
        }
    }
}

impl ToposcopeConfig {
    /// Loads `toposcope.toml` from the workspace root if present, falling
    /// back to defaults; the CLI layer applies flag/env overrides on top of
    /// whatever this returns. Missing fields in a partial TOML file fall
    /// back to `Default::default()` via `#[serde(default)]` on each field.
    pub fn load_or_default(workspace: &std::path::Path) -> Self {
        let path = workspace.join("toposcope.toml");
        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = ToposcopeConfig::default();
        assert_eq!(cfg.extraction_timeout_secs, DEFAULT_EXTRACTION_TIMEOUT_SECS);
        assert_eq!(cfg.max_query_chunk_len, DEFAULT_MAX_QUERY_CHUNK_LEN);
        assert!(!cfg.use_cquery);
    }

    #[test]
    fn parses_flat_toml_document() {
        let parsed: ToposcopeConfig = toml::from_str(
            "bazel_path = \"/usr/bin/bazel\"\nuse_cquery = true\nmax_query_chunk_len = 50000\n",
        )
        .unwrap();
        assert_eq!(parsed.bazel_path, "/usr/bin/bazel");
        assert!(parsed.use_cquery);
        assert_eq!(parsed.max_query_chunk_len, 50_000);
    }

    #[test]
    fn round_trips_through_toml_string() {
        let cfg = ToposcopeConfig::default();
        let text = cfg.to_toml_string().unwrap();
        let parsed: ToposcopeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bazel_path, cfg.bazel_path);
        assert_eq!(parsed.max_query_chunk_len, cfg.max_query_chunk_len);
    }
}
