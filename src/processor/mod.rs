//! Processor contract
//!
//! A processor is one stage of a pipeline. It reads at most one input manifest
//! and writes exactly one output manifest. [`execute`] drives a stage through
//! its lifecycle; map stages delegate per-record work to a [`RecordTransform`]
//! and pick the sequential or parallel executor from their options.

pub mod map;
pub mod parallel;
pub mod sequential;
mod types;

pub use map::{ExecutionOptions, MapStage, RecordTransform};
pub use types::{Entry, Metrics, RunStats, TransformResult};

use crate::error::helpers::common::{no_output_manifest, same_input_output};
use crate::error::{ErrorCode, ErrorExt, PipelineError, Result};
use crate::runner::RunContext;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Resolved manifest paths of one stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageIo {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl StageIo {
    /// Fails with a configuration error when input and output name the same file
    pub fn new(input: Option<PathBuf>, output: Option<PathBuf>) -> Result<Self> {
        if let (Some(input), Some(output)) = (&input, &output) {
            if input == output {
                return Err(same_input_output(input));
            }
        }
        Ok(Self { input, output })
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

/// Lifecycle position of a stage, used in logs and failure messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    Prepared,
    Executing,
    Finalized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Constructed => "constructed",
            Phase::Prepared => "prepared",
            Phase::Executing => "executing",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

impl Phase {
    /// Work done while moving into this phase
    fn activity(self) -> &'static str {
        match self {
            Phase::Constructed => "constructing",
            Phase::Prepared => "preparing",
            Phase::Executing => "executing",
            Phase::Finalized => "finalizing",
        }
    }
}

/// A pipeline stage
#[async_trait]
pub trait Processor: Send + Sync {
    /// Step id or registered name, used in diagnostics
    fn name(&self) -> &str;

    fn io(&self) -> &StageIo;

    /// Called once before the stage body
    async fn prepare(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    /// Stage body. Reads `io().input()` and writes `output`; `wall_time` in the
    /// returned stats is filled in by [`execute`].
    async fn process(&self, ctx: &RunContext, output: &Path) -> Result<RunStats>;

    /// Called once after the stage body succeeds
    async fn finalize(&self, _ctx: &RunContext, _stats: &RunStats) -> Result<()> {
        Ok(())
    }
}

/// Run a stage to completion and return its output manifest path
pub async fn execute(stage: Box<dyn Processor>, ctx: &RunContext) -> Result<PathBuf> {
    execute_with_stats(stage, ctx).await.map(|(output, _)| output)
}

/// Like [`execute`], also returning the stage's stats
pub async fn execute_with_stats(
    stage: Box<dyn Processor>,
    ctx: &RunContext,
) -> Result<(PathBuf, RunStats)> {
    let name = stage.name().to_string();
    let output = stage
        .io()
        .output()
        .ok_or_else(|| no_output_manifest(&name))?
        .to_path_buf();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.to_manifest_error(
            ErrorCode::MANIFEST_WRITE_FAILED,
            "Failed to create output directory",
            parent,
        )?;
    }

    debug!(stage = %name, phase = %Phase::Constructed, "Stage lifecycle");
    stage
        .prepare(ctx)
        .await
        .map_err(|e| stage_failure(&name, Phase::Prepared, e))?;

    debug!(stage = %name, phase = %Phase::Prepared, "Stage lifecycle");
    let started = Instant::now();
    debug!(stage = %name, phase = %Phase::Executing, "Stage lifecycle");
    let mut stats = stage
        .process(ctx, &output)
        .await
        .map_err(|e| stage_failure(&name, Phase::Executing, e))?;
    stats.wall_time = started.elapsed();

    ctx.log(&format!("[{}] {}", name, stats));

    stage
        .finalize(ctx, &stats)
        .await
        .map_err(|e| stage_failure(&name, Phase::Finalized, e))?;
    debug!(stage = %name, phase = %Phase::Finalized, "Stage lifecycle");

    Ok((output, stats))
}

/// Processor errors already carry their context; anything else is wrapped
fn stage_failure(stage: &str, phase: Phase, err: PipelineError) -> PipelineError {
    if err.is_processor() {
        return err.with_context(format!("stage '{}' ({})", stage, phase.activity()));
    }

    let code = match phase {
        Phase::Executing => ErrorCode::PROCESSOR_GENERIC,
        _ => ErrorCode::PROCESSOR_HOOK_FAILED,
    };
    PipelineError::processor_with_code(
        code,
        format!(
            "Processor '{}' failed while {}: {}",
            stage,
            phase.activity(),
            err.user_message()
        ),
    )
    .with_source(err)
}
