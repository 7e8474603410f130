use crate::error::{ErrorCode, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "minidp.toml";

/// Records per parallel chunk when neither config nor step params set one
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Runner defaults, layered as file < environment < command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Base directory for run outputs and temp manifests
    pub workspace_dir: PathBuf,
    /// Keep intermediate manifests after a run
    pub keep_temps: bool,
    /// Worker count for map stages that don't set `max_workers`; 0 is sequential
    pub default_workers: usize,
    /// Chunk size for map stages that don't set `in_memory_chunksize`
    pub default_chunk_size: usize,
    pub log_level: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("./runs"),
            keep_temps: false,
            default_workers: 0,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            log_level: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an explicit file, or from `minidp.toml` if it exists, then
    /// apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.merge_env_vars();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading runner config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration_with_code(
                ErrorCode::CONFIG_INVALID_FILE,
                format!("Failed to read config file {}", path.display()),
            )
            .with_source(e)
        })?;
        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("in {}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            PipelineError::configuration_with_code(
                ErrorCode::CONFIG_INVALID_FILE,
                "Invalid TOML in config",
            )
            .with_source(e)
        })
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn merge_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(workspace) = lookup("MINIDP_WORKSPACE") {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Some(keep) = lookup("MINIDP_KEEP_TEMPS") {
            if let Ok(value) = keep.parse::<bool>() {
                self.keep_temps = value;
            }
        }

        if let Some(workers) = lookup("MINIDP_WORKERS") {
            if let Ok(value) = workers.parse::<usize>() {
                self.default_workers = value;
            }
        }

        if let Some(chunk) = lookup("MINIDP_CHUNK_SIZE") {
            if let Ok(value) = chunk.parse::<usize>() {
                self.default_chunk_size = value;
            }
        }

        if let Some(level) = lookup("MINIDP_LOG_LEVEL") {
            self.log_level = Some(level);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_chunk_size == 0 {
            return Err(PipelineError::configuration_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "default_chunk_size must be greater than 0",
            ));
        }
        Ok(())
    }
}
