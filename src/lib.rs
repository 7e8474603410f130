//! # minidp
//!
//! Runs declarative, linear chains of record-transformation stages over JSONL
//! manifests.
//!
//! ## Usage
//!
//! ```bash
//! minidp run recipe.json [--workspace DIR] [--keep-temps]
//! minidp preview recipe.json [-n 5]
//! minidp validate recipe.json
//! minidp list-processors
//! ```
//!
//! ## Modules
//!
//! - `cli` - Argument parsing and command handlers
//! - `config` - Runner defaults from file and environment
//! - `error` - Unified error type with codes
//! - `manifest` - Streaming JSONL reads and atomic writes
//! - `processor` - Stage lifecycle plus sequential and parallel executors
//! - `processors` - Built-in stages
//! - `recipe` - Recipe model, loading and validation
//! - `registry` - Name and path resolution of stage factories
//! - `runner` - Step selection, I/O stitching and pipeline execution
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod processor;
pub mod processors;
pub mod recipe;
pub mod registry;
pub mod runner;

pub use error::{PipelineError, Result};
pub use manifest::Record;
pub use processor::{Entry, Processor, RecordTransform, RunStats, TransformResult};
pub use recipe::{load_recipe, Recipe, Step};
pub use registry::{ProcessorRegistry, Registration, StageArgs};
pub use runner::{PipelineRunner, RunContext, RunSummary};
