use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run declarative record-transformation pipelines over JSONL manifests
#[derive(Parser, Debug)]
#[command(name = "minidp", version)]
#[command(about = "Run declarative record-transformation pipelines over JSONL manifests", long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Runner configuration file (defaults to ./minidp.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recipe and print the final manifest path
    Run {
        /// Path to the recipe file (JSON, or YAML for .yml/.yaml)
        recipe: PathBuf,

        /// Workspace directory, overriding the recipe and the config
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Keep intermediate manifests after the run
        #[arg(long)]
        keep_temps: bool,
    },
    /// Run a recipe and print the first records of its output
    Preview {
        /// Path to the recipe file
        recipe: PathBuf,

        /// Number of records to show
        #[arg(short = 'n', long, default_value = "5")]
        num_records: usize,

        /// Workspace directory, overriding the recipe and the config
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
    /// Check a recipe without running it
    Validate {
        /// Path to the recipe file
        recipe: PathBuf,
    },
    /// List the registered processor types
    ListProcessors,
}
