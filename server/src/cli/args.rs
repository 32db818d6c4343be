use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "toposcope", version, about = "Structural health analysis for build-tool-managed monorepos")]
pub struct Cli {
    #[arg(long, global = true, help = "Enable info-level logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Enable debug-level logging")]
    pub debug: bool,

    #[arg(long, global = true, help = "Enable trace-level logging with source locations")]
    pub trace: bool,

    #[arg(long, global = true, env = "TOPOSCOPE_TRACE_FILTER")]
    pub trace_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a build graph snapshot at one commit.
    Snapshot {
        #[arg(long, default_value = "HEAD")]
        commit: String,
        #[command(flatten)]
        extraction: ExtractionArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Compute the structural delta between two commits.
    Diff {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Compute the delta and score it against the metric battery.
    Score {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Launch the web dashboard (out of scope for this crate).
    Ui {
        #[arg(long, default_value = ".")]
        repo_path: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    #[arg(long, default_value = ".")]
    pub repo_path: PathBuf,

    #[arg(long, env = "TOPOSCOPE_BAZEL_PATH", default_value = "bazel")]
    pub bazel_path: String,

    #[arg(long)]
    pub bazelrc: Option<PathBuf>,

    #[arg(long)]
    pub cquery: bool,

    #[arg(long, env = "TOPOSCOPE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long)]
    pub base: String,

    #[arg(long)]
    pub head: String,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[arg(long, env = "TOPOSCOPE_BAZEL_DIFF_JAR")]
    pub bazel_diff_jar: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
