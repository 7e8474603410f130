//! Command routing

use crate::cli::args::{Cli, Commands};
use crate::cli::commands::*;
use crate::config::RunnerConfig;
use crate::registry::ProcessorRegistry;
use anyhow::{Context, Result};
use std::path::Path;

/// Execute the parsed command line
pub async fn execute_command(cli: Cli) -> Result<()> {
    let registry =
        ProcessorRegistry::with_builtins().context("Failed to register built-in processors")?;
    let config_path = cli.config;

    match cli.command {
        Commands::Run {
            recipe,
            workspace,
            keep_temps,
        } => {
            let config = load_config(config_path.as_deref())?;
            run_recipe(&registry, config, &recipe, workspace, keep_temps).await
        }
        Commands::Preview {
            recipe,
            num_records,
            workspace,
        } => {
            let config = load_config(config_path.as_deref())?;
            preview_recipe(&registry, config, &recipe, num_records, workspace).await
        }
        Commands::Validate { recipe } => validate_recipe(&recipe),
        Commands::ListProcessors => list_processors(&registry),
    }
}

fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    RunnerConfig::load(path).context("Failed to load configuration")
}
