//! Drives the build tool's query interface and turns its XML output into a
//! `Snapshot`.

use crate::models::error::{Result, ToposcopeError};
use crate::models::graph::{normalize_label, Edge, EdgeType, Node, Snapshot};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub bazel_path: String,
    pub bazelrc: Option<std::path::PathBuf>,
    pub use_cquery: bool,
    pub timeout: Duration,
    pub max_query_chunk_len: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            bazel_path: "bazel".to_string(),
            bazelrc: None,
            use_cquery: false,
            timeout: Duration::from_secs(crate::models::config::DEFAULT_EXTRACTION_TIMEOUT_SECS),
            max_query_chunk_len: crate::models::config::DEFAULT_MAX_QUERY_CHUNK_LEN,
        }
    }
}

/// Extracts the full build graph at the commit already checked out in
/// `workspace`.
pub async fn extract_full(
    workspace: &Path,
    commit_sha: &str,
    branch: Option<String>,
    config: &ExtractorConfig,
) -> Result<Snapshot> {
    extract(workspace, commit_sha, branch, "//...", false, vec![], config).await
}

/// Extracts a scoped, partial build graph reachable from `roots` within
/// `depth` reverse-dependency hops.
pub async fn extract_scoped(
    workspace: &Path,
    commit_sha: &str,
    branch: Option<String>,
    roots: &[String],
    depth: u32,
    config: &ExtractorConfig,
) -> Result<Snapshot> {
    let chunks = chunk_targets(roots, config.max_query_chunk_len);
    let mut nodes: Vec<Node> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let start = std::time::Instant::now();
    for chunk in &chunks {
        let query = build_rdeps_query(chunk, depth);
        let (chunk_nodes, chunk_edges, _) =
            run_query(workspace, &query, config).await?;
        nodes.extend(chunk_nodes);
        edges.extend(chunk_edges);
    }
    let extraction_ms = start.elapsed().as_millis() as u64;
    Ok(Snapshot::build(
        commit_sha,
        branch,
        true,
        roots.to_vec(),
        nodes,
        edges,
        extraction_ms,
        chrono::Utc::now(),
    ))
}

async fn extract(
    workspace: &Path,
    commit_sha: &str,
    branch: Option<String>,
    query: &str,
    partial: bool,
    scope: Vec<String>,
    config: &ExtractorConfig,
) -> Result<Snapshot> {
    let start = std::time::Instant::now();
    let (nodes, edges, _) = run_query(workspace, query, config).await?;
    let extraction_ms = start.elapsed().as_millis() as u64;
    Ok(Snapshot::build(
        commit_sha,
        branch,
        partial,
        scope,
        nodes,
        edges,
        extraction_ms,
        chrono::Utc::now(),
    ))
}

async fn run_query(
    workspace: &Path,
    query: &str,
    config: &ExtractorConfig,
) -> Result<(Vec<Node>, Vec<Edge>, Duration)> {
    let mut args: Vec<String> = Vec::new();
    if let Some(bazelrc) = &config.bazelrc {
        args.push(format!("--bazelrc={}", bazelrc.display()));
    }
    args.push("--noclient_debug".to_string());
    args.push(if config.use_cquery { "cquery".to_string() } else { "query".to_string() });
    args.push("--output=xml".to_string());
    args.push(query.to_string());

    let mut child = Command::new(&config.bazel_path)
        .args(&args)
        .current_dir(workspace)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        // On a timed-out wait below, dropping the `wait_with_output` future
        // drops this `Child`; `kill_on_drop` is what turns that drop into
        // the force-kill §5 requires rather than an orphaned process.
        .kill_on_drop(true)
        .spawn()?;

    let stderr = child.stderr.take().expect("stderr piped");
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "toposcope::bazel_stderr", "{line}");
        }
    });

    let start = std::time::Instant::now();
    let wait_result = tokio::time::timeout(config.timeout, child.wait_with_output()).await;
    let _ = stderr_task.await;

    let output = match wait_result {
        Ok(result) => result?,
        Err(_) => {
            return Err(ToposcopeError::DeadlineExceeded {
                operation: format!("bazel {}", args.join(" ")),
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }
    };

    if !output.status.success() {
        return Err(ToposcopeError::SubprocessFailed {
            command: format!("{} {}", config.bazel_path, args.join(" ")),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let (nodes, edges) = parse_query_xml(&output.stdout)?;
    Ok((nodes, edges, start.elapsed()))
}

#[derive(Default)]
struct RuleRecord {
    class: String,
    name: String,
    deps: Vec<String>,
    runtime_deps: Vec<String>,
    data: Vec<String>,
    tags: Vec<String>,
    visibility: Vec<String>,
}

/// Parses `query --output=xml` into nodes and edges.
fn parse_query_xml(xml: &[u8]) -> Result<(Vec<Node>, Vec<Edge>)> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    let mut current_rule: Option<RuleRecord> = None;
    let mut current_list_name: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| ToposcopeError::ParseError {
            what: "bazel query XML".to_string(),
            message: e.to_string(),
        })? {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "rule" => {
                        let mut rule = RuleRecord::default();
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"class" => {
                                    rule.class = String::from_utf8_lossy(&attr.value).to_string()
                                }
                                b"name" => {
                                    rule.name = String::from_utf8_lossy(&attr.value).to_string()
                                }
                                _ => {}
                            }
                        }
                        current_rule = Some(rule);
                    }
                    "list" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"name" {
                                current_list_name =
                                    Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                    "label" => {
                        if let (Some(rule), Some(list_name)) =
                            (current_rule.as_mut(), current_list_name.as_deref())
                        {
                            let value = attr_value(&e, b"value");
                            if let Some(value) = value {
                                let label = normalize_label(&value);
                                match list_name {
                                    "deps" => rule.deps.push(label),
                                    "runtime_deps" => rule.runtime_deps.push(label),
                                    "data" => rule.data.push(label),
                                    "visibility" => rule.visibility.push(label),
                                    _ => {}
                                }
                            }
                        }
                    }
                    "string" => {
                        if let (Some(rule), Some("tags")) =
                            (current_rule.as_mut(), current_list_name.as_deref())
                        {
                            if let Some(value) = attr_value(&e, b"value") {
                                rule.tags.push(value);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "list" => current_list_name = None,
                    "rule" => {
                        if let Some(rule) = current_rule.take() {
                            let (node, mut rule_edges) = rule_to_node_and_edges(rule);
                            nodes.push(node);
                            edges.append(&mut rule_edges);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((nodes, edges))
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn rule_to_node_and_edges(rule: RuleRecord) -> (Node, Vec<Edge>) {
    let key = normalize_label(&rule.name);
    let node = Node::new(key.clone(), rule.class)
        .with_tags(rule.tags)
        .with_visibility(rule.visibility);

    let mut edges = Vec::new();
    for to in rule.deps {
        edges.push(Edge::new(key.clone(), to, EdgeType::Compile));
    }
    for to in rule.runtime_deps {
        edges.push(Edge::new(key.clone(), to, EdgeType::Runtime));
    }
    for to in rule.data {
        edges.push(Edge::new(key.clone(), to, EdgeType::Data));
    }
    (node, edges)
}

/// Builds an `rdeps` query over `targets` within `depth` hops, or the
/// universe query when `targets` is empty.
pub fn build_rdeps_query(targets: &[String], depth: u32) -> String {
    if targets.is_empty() {
        return "//...".to_string();
    }
    format!("rdeps(//..., set({}), {depth})", targets.join(" "))
}

/// Splits `targets` into chunks whose serialized length (labels joined by a
/// single space) stays at or under `max_len`. Always yields at least one
/// chunk, even for empty input.
pub fn chunk_targets(targets: &[String], max_len: usize) -> Vec<Vec<String>> {
    if targets.is_empty() {
        return vec![Vec::new()];
    }
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;
    for target in targets {
        let added_len = target.len() + if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && current_len + added_len > max_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += target.len() + if current.is_empty() { 0 } else { 1 };
        current.push(target.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
