use super::{parallel, sequential, Processor, RunStats, StageIo, TransformResult};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{ErrorCode, PipelineError, Result};
use crate::manifest::{ManifestReader, ManifestWriter, Record};
use crate::runner::RunContext;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Step parameter selecting the worker count of a map stage
pub const MAX_WORKERS_PARAM: &str = "max_workers";
/// Step parameter selecting the parallel chunk size of a map stage
pub const CHUNK_SIZE_PARAM: &str = "in_memory_chunksize";
/// Largest worker pool a map stage may request
pub const MAX_WORKERS_LIMIT: usize = 1024;

/// Per-record transformation applied by a [`MapStage`].
///
/// Implementations must be safe to call from several worker threads at once;
/// the parallel executor relies on the transform being pure for its output to
/// match the sequential one.
pub trait RecordTransform: Send + Sync + 'static {
    fn transform(&self, record: Record) -> Result<TransformResult>;

    fn prepare(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    fn finalize(&self, _ctx: &RunContext, _stats: &RunStats) -> Result<()> {
        Ok(())
    }
}

/// How a map stage schedules its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// 0 runs sequentially
    pub max_workers: usize,
    pub chunk_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::sequential()
    }
}

impl ExecutionOptions {
    pub fn sequential() -> Self {
        Self {
            max_workers: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn parallel(max_workers: usize, chunk_size: usize) -> Self {
        Self {
            max_workers,
            chunk_size,
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.max_workers > 0
    }

    /// Remove `max_workers` and `in_memory_chunksize` from `params`, falling
    /// back to `defaults` for whichever is absent
    pub fn take_from_params(params: &mut Map<String, Value>, defaults: Self) -> Result<Self> {
        let max_workers = match params.remove(MAX_WORKERS_PARAM) {
            Some(value) => parse_count(MAX_WORKERS_PARAM, &value)?,
            None => defaults.max_workers,
        };
        let chunk_size = match params.remove(CHUNK_SIZE_PARAM) {
            Some(value) => parse_count(CHUNK_SIZE_PARAM, &value)?,
            None => defaults.chunk_size,
        };

        if max_workers > MAX_WORKERS_LIMIT {
            return Err(PipelineError::configuration_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!(
                    "'{}' must be at most {}, got {}",
                    MAX_WORKERS_PARAM, MAX_WORKERS_LIMIT, max_workers
                ),
            ));
        }
        if chunk_size == 0 {
            return Err(PipelineError::configuration_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("'{}' must be greater than 0", CHUNK_SIZE_PARAM),
            ));
        }

        Ok(Self {
            max_workers,
            chunk_size,
        })
    }
}

fn parse_count(key: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            PipelineError::configuration_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("'{}' must be a non-negative integer, got {}", key, value),
            )
        })
}

/// A stage that applies a [`RecordTransform`] to every input record
pub struct MapStage<T> {
    name: String,
    io: StageIo,
    options: ExecutionOptions,
    transform: Arc<T>,
}

impl<T: RecordTransform> MapStage<T> {
    pub fn new(name: impl Into<String>, io: StageIo, transform: T) -> Self {
        Self {
            name: name.into(),
            io,
            options: ExecutionOptions::default(),
            transform: Arc::new(transform),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }
}

#[async_trait]
impl<T: RecordTransform> Processor for MapStage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn io(&self) -> &StageIo {
        &self.io
    }

    async fn prepare(&self, ctx: &RunContext) -> Result<()> {
        self.transform.prepare(ctx)
    }

    async fn process(&self, _ctx: &RunContext, output: &Path) -> Result<RunStats> {
        let reader = match self.io.input() {
            Some(input) => ManifestReader::open(input).await?,
            None => ManifestReader::empty(),
        };
        let writer = ManifestWriter::create(output).await?;

        if self.options.is_parallel() {
            debug!(
                stage = %self.name,
                workers = self.options.max_workers,
                chunk_size = self.options.chunk_size,
                "Running map stage in parallel"
            );
            parallel::run(
                self.transform.clone(),
                reader,
                writer,
                self.options.max_workers,
                self.options.chunk_size,
            )
            .await
        } else {
            debug!(stage = %self.name, "Running map stage sequentially");
            sequential::run(self.transform.as_ref(), reader, writer).await
        }
    }

    async fn finalize(&self, ctx: &RunContext, stats: &RunStats) -> Result<()> {
        self.transform.finalize(ctx, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_take_from_params_removes_keys() {
        let mut p = params(json!({"max_workers": 4, "in_memory_chunksize": 50, "fields": {}}));
        let options = ExecutionOptions::take_from_params(&mut p, ExecutionOptions::sequential())
            .unwrap();

        assert_eq!(options, ExecutionOptions::parallel(4, 50));
        assert!(options.is_parallel());
        assert_eq!(p.len(), 1);
        assert!(p.contains_key("fields"));
    }

    #[test]
    fn test_take_from_params_uses_defaults() {
        let mut p = Map::new();
        let options =
            ExecutionOptions::take_from_params(&mut p, ExecutionOptions::parallel(2, 7)).unwrap();
        assert_eq!(options, ExecutionOptions::parallel(2, 7));

        let mut p = params(json!({"max_workers": 0}));
        let options =
            ExecutionOptions::take_from_params(&mut p, ExecutionOptions::parallel(2, 7)).unwrap();
        assert!(!options.is_parallel());

        let mut p = params(json!({"max_workers": MAX_WORKERS_LIMIT}));
        let options =
            ExecutionOptions::take_from_params(&mut p, ExecutionOptions::default()).unwrap();
        assert_eq!(options.max_workers, MAX_WORKERS_LIMIT);
    }

    #[test]
    fn test_take_from_params_rejects_bad_values() {
        for bad in [
            json!({"max_workers": -1}),
            json!({"max_workers": "four"}),
            json!({"in_memory_chunksize": 0}),
            json!({"in_memory_chunksize": 1.5}),
            json!({"max_workers": 2305843009213693952u64}),
            json!({"max_workers": MAX_WORKERS_LIMIT + 1}),
        ] {
            let mut p = params(bad);
            let err = ExecutionOptions::take_from_params(&mut p, ExecutionOptions::default())
                .unwrap_err();
            assert!(err.is_configuration());
        }
    }
}
