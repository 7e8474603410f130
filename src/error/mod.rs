use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::ErrorExt;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for pipeline loading and execution
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Configuration {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Invalid recipe: {message}")]
    RecipeInvalid {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Registry error: {message}")]
    Registry {
        code: u16,
        message: String,
        processor: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Processor error: {message}")]
    Processor {
        code: u16,
        message: String,
        step: Option<String>,
        record: Option<u64>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Manifest error: {message}")]
    Manifest {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        line: Option<u64>,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl PipelineError {
    /// Create a configuration error with default code
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::configuration_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn configuration_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a recipe validation error with default code
    pub fn recipe(message: impl Into<String>) -> Self {
        Self::recipe_with_code(ErrorCode::RECIPE_GENERIC, message, None)
    }

    /// Create a recipe validation error with specific code and offending field
    pub fn recipe_with_code(code: u16, message: impl Into<String>, field: Option<String>) -> Self {
        Self::RecipeInvalid {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create a registry error with default code
    pub fn registry(message: impl Into<String>) -> Self {
        Self::registry_with_code(ErrorCode::REGISTRY_GENERIC, message, None)
    }

    /// Create a registry error with specific code and processor type
    pub fn registry_with_code(
        code: u16,
        message: impl Into<String>,
        processor: Option<String>,
    ) -> Self {
        Self::Registry {
            code,
            message: message.into(),
            processor,
            source: None,
        }
    }

    /// Create a processor error with default code
    pub fn processor(message: impl Into<String>) -> Self {
        Self::processor_with_code(ErrorCode::PROCESSOR_GENERIC, message)
    }

    /// Create a processor error with specific code
    pub fn processor_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Processor {
            code,
            message: message.into(),
            step: None,
            record: None,
            source: None,
        }
    }

    /// Create a manifest error with default code
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::manifest_with_code(ErrorCode::MANIFEST_GENERIC, message, None)
    }

    /// Create a manifest error with specific code and path
    pub fn manifest_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Manifest {
            code,
            message: message.into(),
            path,
            line: None,
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Configuration { source: src, .. }
            | Self::RecipeInvalid { source: src, .. }
            | Self::Registry { source: src, .. }
            | Self::Processor { source: src, .. }
            | Self::Manifest { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Configuration { message, .. }
            | Self::RecipeInvalid { message, .. }
            | Self::Registry { message, .. }
            | Self::Processor { message, .. }
            | Self::Manifest { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Set the failing step id for a processor error
    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        if let Self::Processor {
            step: ref mut s, ..
        } = self
        {
            *s = Some(step_id.into());
        }
        self
    }

    /// Set the failing record ordinal for a processor error
    pub fn with_record(mut self, ordinal: u64) -> Self {
        if let Self::Processor {
            record: ref mut r, ..
        } = self
        {
            *r = Some(ordinal);
        }
        self
    }

    /// Set the line number for a manifest error
    pub fn with_line(mut self, line_number: u64) -> Self {
        if let Self::Manifest {
            line: ref mut l, ..
        } = self
        {
            *l = Some(line_number);
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Configuration { code, .. }
            | Self::RecipeInvalid { code, .. }
            | Self::Registry { code, .. }
            | Self::Processor { code, .. }
            | Self::Manifest { code, .. } => *code,
        }
    }

    /// Step id attached to a processor error, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Processor { step, .. } => step.as_deref(),
            _ => None,
        }
    }

    /// Record ordinal attached to a processor error, if any
    pub fn record(&self) -> Option<u64> {
        match self {
            Self::Processor { record, .. } => *record,
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_recipe_invalid(&self) -> bool {
        matches!(self, Self::RecipeInvalid { .. })
    }

    pub fn is_registry(&self) -> bool {
        matches!(self, Self::Registry { .. })
    }

    pub fn is_processor(&self) -> bool {
        matches!(self, Self::Processor { .. })
    }

    pub fn is_manifest(&self) -> bool {
        matches!(self, Self::Manifest { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration { message, .. } => format!("Configuration problem: {}", message),
            Self::RecipeInvalid { message, field, .. } => {
                if let Some(f) = field {
                    format!("Invalid recipe field '{}': {}", f, message)
                } else {
                    format!("Invalid recipe: {}", message)
                }
            }
            Self::Registry {
                message, processor, ..
            } => {
                if let Some(p) = processor {
                    format!("Processor '{}': {}", p, message)
                } else {
                    format!("Registry error: {}", message)
                }
            }
            Self::Processor {
                message,
                step,
                record,
                ..
            } => {
                let mut msg = String::from("Processing failed");
                if let Some(s) = step {
                    msg.push_str(&format!(" in step '{}'", s));
                }
                if let Some(r) = record {
                    msg.push_str(&format!(" at record {}", r));
                }
                format!("{}: {}", msg, message)
            }
            Self::Manifest {
                message,
                path,
                line,
                ..
            } => match (path, line) {
                (Some(p), Some(l)) => format!("Manifest {}:{}: {}", p.display(), l, message),
                (Some(p), None) => format!("Manifest {}: {}", p.display(), message),
                _ => format!("Manifest error: {}", message),
            },
        }
    }

    /// Get a developer-friendly error message with the full source chain
    pub fn developer_message(&self) -> String {
        let mut msg = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            msg.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        msg
    }
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::MANIFEST_READ_FAILED,
            _ => ErrorCode::MANIFEST_GENERIC,
        };
        PipelineError::manifest_with_code(code, "I/O operation failed", None).with_source(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::recipe_with_code(ErrorCode::RECIPE_INVALID_JSON, "Invalid JSON", None)
            .with_source(err)
    }
}
