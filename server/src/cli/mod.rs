pub mod args;

use crate::models::config::ToposcopeConfig;
use crate::models::error::{Result, ToposcopeError};
use crate::services::extractor::{self, ExtractorConfig};
use crate::services::git_ops::{self, RefGuard};
use crate::services::orchestrator::{Orchestrator, PipelineRequest};
pub use args::{Cli, Commands, ExtractionArgs, OutputFormat, PipelineArgs};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the tracing subscriber from the CLI's global verbosity flags,
/// defaulting to warn-level production logging. Mirrors the teacher's
/// `init_tracing`: `--trace` is the most verbose, `--trace-filter` overrides
/// everything with a raw `EnvFilter` directive string.
pub fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if let Some(custom) = &cli.trace_filter {
        EnvFilter::try_new(custom)?
    } else if cli.trace {
        EnvFilter::new("debug,toposcope=trace")
    } else if cli.debug {
        EnvFilter::new("warn,toposcope=debug")
    } else if cli.verbose {
        EnvFilter::new("warn,toposcope=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(cli.debug || cli.trace)
                .with_thread_ids(cli.trace)
                .with_file(cli.trace)
                .with_line_number(cli.trace)
                .compact(),
        )
        .init();

    Ok(())
}

fn config_from_extraction(extraction: &ExtractionArgs) -> ToposcopeConfig {
    let mut config = ToposcopeConfig::load_or_default(&extraction.repo_path);
    config.bazel_path = extraction.bazel_path.clone();
    config.bazelrc = extraction.bazelrc.clone();
    config.use_cquery = extraction.cquery;
    if let Some(cache_dir) = &extraction.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    config
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Snapshot { commit, extraction, output } => run_snapshot(commit, extraction, output).await,
        Commands::Diff { pipeline } => run_diff(pipeline).await,
        Commands::Score { pipeline } => run_score(pipeline).await,
        Commands::Ui { .. } => Err(ToposcopeError::ConfigError(
            "the web dashboard is a separate collaborator, not part of this crate".to_string(),
        )),
    }
}

async fn run_snapshot(commit: String, extraction: ExtractionArgs, output: OutputFormat) -> Result<()> {
    let config = config_from_extraction(&extraction);
    let repo_path = &extraction.repo_path;

    let sha = git_ops::resolve_ref(repo_path, &commit)?;
    let original_ref = git_ops::current_symbolic_ref_or_sha(repo_path)?;
    let _guard = RefGuard::new(repo_path, original_ref);

    git_ops::checkout(repo_path, &sha)?;
    let extractor_config = ExtractorConfig {
        bazel_path: config.bazel_path.clone(),
        bazelrc: config.bazelrc.clone(),
        use_cquery: config.use_cquery,
        timeout: std::time::Duration::from_secs(config.extraction_timeout_secs),
        max_query_chunk_len: config.max_query_chunk_len,
    };
    let branch = git_ops::current_symbolic_ref_or_sha(repo_path).ok();
    let snapshot = extractor::extract_full(repo_path, &sha, branch, &extractor_config).await?;

    let cache = crate::services::cache::SnapshotCache::new(&config.cache_dir);
    cache.save_snapshot(&snapshot)?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Text => {
            info!(
                nodes = snapshot.stats.node_count,
                edges = snapshot.stats.edge_count,
                packages = snapshot.stats.package_count,
                "extracted snapshot"
            );
            println!(
                "{}: {} nodes, {} edges, {} packages ({}ms)",
                snapshot.commit_sha,
                snapshot.stats.node_count,
                snapshot.stats.edge_count,
                snapshot.stats.package_count,
                snapshot.stats.extraction_ms
            );
        }
    }
    Ok(())
}

async fn run_diff(pipeline: PipelineArgs) -> Result<()> {
    let output = run_pipeline(&pipeline).await?;
    match pipeline.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output.delta)?),
        OutputFormat::Text => {
            println!(
                "{} -> {}: +{} nodes, -{} nodes, +{} edges, -{} edges",
                output.delta.base_commit,
                output.delta.head_commit,
                output.delta.stats.added_node_count,
                output.delta.stats.removed_node_count,
                output.delta.stats.added_edge_count,
                output.delta.stats.removed_edge_count,
            );
        }
    }
    Ok(())
}

async fn run_score(pipeline: PipelineArgs) -> Result<()> {
    let output_format = pipeline.output;
    let output = run_pipeline(&pipeline).await?;
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output.score)?),
        OutputFormat::Text => {
            println!(
                "grade {} (total {:.2}) — {} -> {}",
                output.score.grade,
                output.score.total_score,
                output.score.base_commit,
                output.score.head_commit
            );
            for metric in &output.score.breakdown {
                println!("  {} [{}]: {:.2}", metric.name, metric.severity, metric.contribution);
            }
            for hotspot in &output.score.hotspots {
                println!("  hotspot: {} ({:.2})", hotspot.node_key, hotspot.contribution);
            }
        }
    }
    Ok(())
}

async fn run_pipeline(
    pipeline: &PipelineArgs,
) -> Result<crate::services::orchestrator::PipelineOutput> {
    let mut config = config_from_extraction(&pipeline.extraction);
    config.bazel_diff_jar = pipeline.bazel_diff_jar.clone();

    let orchestrator = Orchestrator::new(config);
    orchestrator
        .run(PipelineRequest {
            workspace: &pipeline.extraction.repo_path,
            base_ref: &pipeline.base,
            head_ref: &pipeline.head,
        })
        .await
}
