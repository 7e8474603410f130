use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Destination for stage log lines
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-run state shared by reference with every stage
#[derive(Clone)]
pub struct RunContext {
    run_id: String,
    workspace_dir: PathBuf,
    tmp_dir: PathBuf,
    env: Map<String, Value>,
    sink: LogSink,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        workspace_dir: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        let run_id = run_id.into();
        let sink = tracing_sink(run_id.clone());
        Self {
            run_id,
            workspace_dir: workspace_dir.into(),
            tmp_dir: tmp_dir.into(),
            env: Map::new(),
            sink,
        }
    }

    /// Short random id used for temp directories and log prefixes
    pub fn generate_run_id() -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }

    pub fn with_env(mut self, env: Map<String, Value>) -> Self {
        self.env = env;
        self
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn env(&self) -> &Map<String, Value> {
        &self.env
    }

    /// Send a message to the sink, prefixed with the run id
    pub fn log(&self, message: &str) {
        (self.sink)(&format!("[{}] {}", self.run_id, message));
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("workspace_dir", &self.workspace_dir)
            .field("tmp_dir", &self.tmp_dir)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

/// Default sink: one `info` event per message with the run id attached
pub fn tracing_sink(run_id: String) -> LogSink {
    Arc::new(move |message: &str| info!(run_id = %run_id, "{}", message))
}
