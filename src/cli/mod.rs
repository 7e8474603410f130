//! CLI command handlers
//!
//! This module contains all CLI-related functionality including:
//! - Argument parsing structures
//! - Command implementations
//! - Routing from parsed arguments to commands

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;

use crate::config::RunnerConfig;
use crate::error::{describe_error_code, PipelineError};
use std::path::Path;

/// `log_level` from the config file and `MINIDP_LOG_LEVEL`, if any.
///
/// Runs before logging is set up, so a broken config is ignored here and
/// reported by the command that needs it.
pub fn configured_log_level(config_path: Option<&Path>) -> Option<String> {
    RunnerConfig::load(config_path).ok()?.log_level
}

/// Log filter for a `-v` count, with the configured level used when no flag is given
pub fn get_log_level(verbose: u8, configured: Option<&str>) -> String {
    match (verbose, configured) {
        (0, Some(level)) if !level.trim().is_empty() => level.to_string(),
        (0, _) => "info".to_string(),
        (1, _) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Text printed to stderr when a command fails
///
/// With `-v` the error code and full source chain of the underlying pipeline
/// error are appended.
pub fn format_error_report(error: &anyhow::Error, verbose: u8) -> String {
    let mut report = format!("{:#}", error);
    if verbose == 0 {
        return report;
    }
    if let Some(pipeline_err) = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
    {
        let code = pipeline_err.code();
        report.push_str(&format!(
            "\n\nError code E{:04}: {}\nContext Chain:\n{}",
            code,
            describe_error_code(code),
            pipeline_err.developer_message()
        ));
    }
    report
}
