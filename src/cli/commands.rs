//! Command implementations

use crate::config::RunnerConfig;
use crate::recipe::load_recipe;
use crate::registry::ProcessorRegistry;
use crate::runner::PipelineRunner;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Run a recipe and print the final manifest path
pub async fn run_recipe(
    registry: &ProcessorRegistry,
    config: RunnerConfig,
    recipe_path: &Path,
    workspace: Option<PathBuf>,
    keep_temps: bool,
) -> Result<()> {
    let recipe = load_recipe(recipe_path).context("Error loading recipe")?;

    let mut runner = PipelineRunner::new(registry, config);
    if let Some(workspace) = workspace {
        runner = runner.with_workspace(workspace);
    }
    if keep_temps {
        runner = runner.with_keep_temps(true);
    }

    let summary = runner
        .run_with_summary(&recipe)
        .await
        .context("Error running recipe")?;
    debug!(run_id = %summary.run_id, "Run summary: {} step(s)", summary.steps.len());

    println!();
    println!("Output manifest: {}", summary.final_output.display());
    Ok(())
}

/// Run a recipe and print up to `count` output records
pub async fn preview_recipe(
    registry: &ProcessorRegistry,
    config: RunnerConfig,
    recipe_path: &Path,
    count: usize,
    workspace: Option<PathBuf>,
) -> Result<()> {
    let recipe = load_recipe(recipe_path).context("Error loading recipe")?;

    let mut runner = PipelineRunner::new(registry, config);
    if let Some(workspace) = workspace {
        runner = runner.with_workspace(workspace);
    }

    let records = runner
        .preview(&recipe, count)
        .await
        .context("Error running recipe")?;

    if records.is_empty() {
        println!("No output records.");
        return Ok(());
    }

    println!();
    println!("First {} record(s):", records.len());
    println!();
    for (i, record) in records.iter().enumerate() {
        println!("--- Record {} ---", i + 1);
        println!("{}", serde_json::to_string_pretty(record)?);
        println!();
    }
    Ok(())
}

/// Validate a recipe and print its name and step count
pub fn validate_recipe(recipe_path: &Path) -> Result<()> {
    let recipe = load_recipe(recipe_path).context("Validation error")?;

    println!("Recipe '{}' is valid.", recipe_path.display());
    println!("  Name: {}", recipe.display_name());
    println!("  Steps: {}", recipe.steps.len());
    Ok(())
}

/// Print every registered processor with its description
pub fn list_processors(registry: &ProcessorRegistry) -> Result<()> {
    if registry.is_empty() {
        println!("No processors registered.");
        return Ok(());
    }

    println!("Available processors:");
    for (name, description) in registry.list() {
        let first_line = description.lines().next().unwrap_or_default();
        println!("  {}: {}", name, first_line);
    }
    Ok(())
}
