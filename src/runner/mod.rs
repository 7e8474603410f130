//! Pipeline runner
//!
//! Drives a recipe end to end: selects steps, stitches their manifest paths,
//! constructs each stage through the registry and executes the stages one at a
//! time inside a run-scoped temp directory.

mod context;
mod stitch;

pub use context::{tracing_sink, LogSink, RunContext};
pub use stitch::{stitch, temp_output_name, StitchedStep};

use crate::config::RunnerConfig;
use crate::error::{ErrorCode, ErrorExt, PipelineError, Result};
use crate::manifest::{read_head, Record};
use crate::processor::{execute_with_stats, ExecutionOptions, RunStats};
use crate::recipe::Recipe;
use crate::registry::{ProcessorRegistry, StageArgs};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory under the workspace holding per-run temp directories
pub const TMP_DIR_NAME: &str = ".tmp";

/// Final manifest of a run whose recipe declares no `output_manifest`.
///
/// Lives beside the temp directory so cleanup never removes it.
pub fn default_output_path(workspace: &Path, run_id: &str) -> PathBuf {
    workspace.join(format!("{}_output.jsonl", run_id))
}

/// What one executed step did
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step_id: String,
    pub processor: String,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub stats: RunStats,
}

/// Result of a full run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Empty when the recipe selected no steps and declared no input
    pub final_output: PathBuf,
    pub steps: Vec<StepReport>,
}

/// Executes recipes against a registry
pub struct PipelineRunner<'r> {
    registry: &'r ProcessorRegistry,
    config: RunnerConfig,
    workspace_override: Option<PathBuf>,
    sink: Option<LogSink>,
}

impl<'r> PipelineRunner<'r> {
    pub fn new(registry: &'r ProcessorRegistry, config: RunnerConfig) -> Self {
        Self {
            registry,
            config,
            workspace_override: None,
            sink: None,
        }
    }

    /// Workspace that takes precedence over the recipe's and the config's
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace_override = Some(workspace.into());
        self
    }

    pub fn with_keep_temps(mut self, keep_temps: bool) -> Self {
        self.config.keep_temps = keep_temps;
        self
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Workspace for `recipe`: runner override, then recipe, then config
    pub fn resolve_workspace(&self, recipe: &Recipe) -> PathBuf {
        self.workspace_override
            .clone()
            .or_else(|| {
                recipe
                    .workspace_dir
                    .clone()
                    .filter(|p| !p.as_os_str().is_empty())
            })
            .unwrap_or_else(|| self.config.workspace_dir.clone())
    }

    /// Run `recipe` and return the final manifest path
    pub async fn run(&self, recipe: &Recipe) -> Result<PathBuf> {
        self.run_with_summary(recipe)
            .await
            .map(|summary| summary.final_output)
    }

    /// Run `recipe` and report every executed step
    pub async fn run_with_summary(&self, recipe: &Recipe) -> Result<RunSummary> {
        recipe.validate()?;
        let selected = recipe.selected_steps()?;

        let workspace = self.resolve_workspace(recipe);
        let run_id = RunContext::generate_run_id();
        let tmp_dir = workspace.join(TMP_DIR_NAME).join(&run_id);
        tokio::fs::create_dir_all(&tmp_dir)
            .await
            .to_configuration_error(format!(
                "Failed to create workspace {}",
                workspace.display()
            ))?;

        let mut ctx = RunContext::new(run_id.clone(), workspace.clone(), tmp_dir.clone())
            .with_env(recipe.env.clone());
        if let Some(sink) = &self.sink {
            ctx = ctx.with_sink(sink.clone());
        }

        let started_at = Utc::now();
        ctx.log(&format!("Starting pipeline: {}", recipe.display_name()));

        let result = if selected.is_empty() {
            ctx.log("No enabled steps to run");
            Ok((
                recipe.input_manifest.clone().unwrap_or_default(),
                Vec::new(),
            ))
        } else {
            ctx.log(&format!("Running {} step(s)", selected.len()));
            let final_target = recipe
                .output_manifest
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| default_output_path(&workspace, &run_id));
            let stitched = stitch(
                &selected,
                recipe.input_manifest.as_deref(),
                Some(&final_target),
                &tmp_dir,
            );
            self.execute_chain(&stitched, &ctx).await
        };

        if !self.config.keep_temps {
            remove_temp_dir(&tmp_dir).await;
        }

        let (final_output, steps) = result?;
        ctx.log(&format!("Pipeline complete. Output: {}", final_output.display()));
        info!(run_id = %run_id, steps = steps.len(), "Run finished");

        Ok(RunSummary {
            run_id,
            started_at,
            final_output,
            steps,
        })
    }

    async fn execute_chain(
        &self,
        stitched: &[StitchedStep<'_>],
        ctx: &RunContext,
    ) -> Result<(PathBuf, Vec<StepReport>)> {
        let defaults = ExecutionOptions::parallel(
            self.config.default_workers,
            self.config.default_chunk_size,
        );
        let mut reports = Vec::with_capacity(stitched.len());
        let mut final_output = PathBuf::new();

        for item in stitched {
            let processor = item.step.processor_type.as_str();
            ctx.log(&format!("Running step '{}' ({})", item.step_id, processor));

            let args = StageArgs {
                name: item.step_id.clone(),
                input_manifest: item.input.clone(),
                output_manifest: Some(item.output.clone()),
                params: item.step.params.clone(),
                defaults,
            };

            let stage = self
                .registry
                .create(processor, args)
                .map_err(|e| e.with_context(format!("step '{}'", item.step_id)))?;

            let (output, stats) = execute_with_stats(stage, ctx)
                .await
                .map_err(|e| step_failure(&item.step_id, e))?;

            final_output = output.clone();
            reports.push(StepReport {
                step_id: item.step_id.clone(),
                processor: processor.to_string(),
                input: item.input.clone(),
                output,
                stats,
            });
        }

        Ok((final_output, reports))
    }

    /// Run `recipe` and return up to `n` records of its final manifest
    pub async fn preview(&self, recipe: &Recipe, n: usize) -> Result<Vec<Record>> {
        let output = self.run(recipe).await?;
        if output.as_os_str().is_empty() {
            return Ok(Vec::new());
        }
        read_head(&output, n).await
    }
}

fn step_failure(step_id: &str, err: PipelineError) -> PipelineError {
    let mut wrapped = PipelineError::processor_with_code(
        ErrorCode::PROCESSOR_STEP_FAILED,
        format!("Step '{}' failed: {}", step_id, err.user_message()),
    )
    .with_step(step_id);
    if let Some(ordinal) = err.record() {
        wrapped = wrapped.with_record(ordinal);
    }
    wrapped.with_source(err)
}

async fn remove_temp_dir(tmp_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(tmp_dir).await {
        warn!("Failed to remove temp dir {}: {}", tmp_dir.display(), e);
        return;
    }
    // Only succeeds once no other run is using the shared parent
    if let Some(parent) = tmp_dir.parent() {
        let _ = tokio::fs::remove_dir(parent).await;
    }
}
