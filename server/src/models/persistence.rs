//! Self-describing, round-trippable persistence for snapshots, deltas, and
//! scores (spec §4.1, §6, §8).

use crate::models::delta::Delta;
use crate::models::error::{Result, ToposcopeError};
use crate::models::graph::Snapshot;
use crate::models::score::ScoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: String,
    payload: T,
}

fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn save_envelope<T: Serialize>(path: &Path, kind: &str, payload: &T) -> Result<()> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        payload,
    };
    let text = serde_json::to_string_pretty(&envelope)?;
    write_atomically(path, &text)
}

fn load_envelope<T: for<'de> Deserialize<'de>>(path: &Path, expected_kind: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
        ToposcopeError::ParseError {
            what: format!("{expected_kind} at {}", path.display()),
            message: e.to_string(),
        }
    })?;
    if envelope.kind != expected_kind {
        return Err(ToposcopeError::ParseError {
            what: path.display().to_string(),
            message: format!(
                "expected kind `{expected_kind}`, found `{}`",
                envelope.kind
            ),
        });
    }
    Ok(envelope.payload)
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    save_envelope(path, "snapshot", snapshot)
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    load_envelope(path, "snapshot")
}

pub fn save_delta(path: &Path, delta: &Delta) -> Result<()> {
    save_envelope(path, "delta", delta)
}

pub fn load_delta(path: &Path) -> Result<Delta> {
    load_envelope(path, "delta")
}

pub fn save_score(path: &Path, score: &ScoreResult) -> Result<()> {
    save_envelope(path, "score", score)
}

pub fn load_score(path: &Path) -> Result<ScoreResult> {
    load_envelope(path, "score")
}
