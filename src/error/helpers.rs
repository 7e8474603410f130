use super::{ErrorCode, PipelineError};
use std::path::Path;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    fn to_configuration_error(self, message: impl Into<String>) -> Result<T, PipelineError>;
    fn to_recipe_error(self, message: impl Into<String>) -> Result<T, PipelineError>;

    /// Convert to a manifest error carrying the manifest path
    fn to_manifest_error(
        self,
        code: u16,
        message: impl Into<String>,
        path: &Path,
    ) -> Result<T, PipelineError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_configuration_error(self, message: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::configuration(message).with_source(e))
    }

    fn to_recipe_error(self, message: impl Into<String>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::recipe(message).with_source(e))
    }

    fn to_manifest_error(
        self,
        code: u16,
        message: impl Into<String>,
        path: &Path,
    ) -> Result<T, PipelineError> {
        self.map_err(|e| {
            PipelineError::manifest_with_code(code, message, Some(path.to_path_buf()))
                .with_source(e)
        })
    }
}

/// Helper functions for common error scenarios
pub mod common {
    use super::*;

    /// A required recipe field is absent
    pub fn missing_field(field: &str, context: &str) -> PipelineError {
        PipelineError::recipe_with_code(
            ErrorCode::RECIPE_MISSING_FIELD,
            format!("{} must have '{}' key", context, field),
            Some(field.to_string()),
        )
    }

    /// A recipe field has the wrong JSON type
    pub fn invalid_type(field: &str, context: &str, expected: &str) -> PipelineError {
        PipelineError::recipe_with_code(
            ErrorCode::RECIPE_INVALID_TYPE,
            format!("{} '{}' must be {}", context, field, expected),
            Some(field.to_string()),
        )
    }

    /// A stage was configured to read and write the same manifest
    pub fn same_input_output(path: &Path) -> PipelineError {
        PipelineError::configuration_with_code(
            ErrorCode::CONFIG_SAME_INPUT_OUTPUT,
            format!(
                "input_manifest and output_manifest must not be equal: '{}'",
                path.display()
            ),
        )
    }

    /// A stage was executed without an output manifest
    pub fn no_output_manifest(stage: &str) -> PipelineError {
        PipelineError::processor_with_code(
            ErrorCode::PROCESSOR_NO_OUTPUT,
            format!("Processor '{}' has no output_manifest set", stage),
        )
    }
}
