//! Structural validation of raw recipe documents
//!
//! Validation runs on the untyped JSON value so that type mistakes are
//! reported against the recipe's own field names and step indices, before any
//! deserialization or stage construction happens.

use crate::error::helpers::common::{invalid_type, missing_field};
use crate::error::{ErrorCode, PipelineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// Half-open step slice such as `2:`, `1:4` or `:3`
static SLICE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d*):(\d*)$").unwrap());

/// Selector value meaning every step
pub const ALL_STEPS: &str = "all";

/// Validate a raw recipe document
pub fn validate_recipe(recipe: &Value) -> Result<()> {
    let Some(object) = recipe.as_object() else {
        return Err(PipelineError::recipe_with_code(
            ErrorCode::RECIPE_INVALID_TYPE,
            "Recipe must be a JSON object",
            None,
        ));
    };

    let steps = object
        .get("steps")
        .ok_or_else(|| missing_field("steps", "Recipe"))?;
    let steps = steps
        .as_array()
        .ok_or_else(|| invalid_type("steps", "Recipe", "a list"))?;

    let mut seen_ids = HashSet::new();
    for (index, step) in steps.iter().enumerate() {
        validate_step(step, index, &mut seen_ids)?;
    }

    if let Some(selector) = object.get("steps_to_run") {
        let parsed = selector
            .as_str()
            .map(|s| parse_steps_to_run(s, steps.len()));
        if !matches!(parsed, Some(Ok(_))) {
            return Err(PipelineError::recipe_with_code(
                ErrorCode::RECIPE_INVALID_SLICE,
                format!(
                    "Invalid 'steps_to_run': {}. Must be 'all' or a slice like '2:', '1:4', ':3'",
                    selector
                ),
                Some("steps_to_run".to_string()),
            ));
        }
    }

    for key in ["name", "version"] {
        if let Some(value) = object.get(key) {
            if !value.is_string() {
                return Err(invalid_type(key, "Recipe", "a string"));
            }
        }
    }

    for key in ["workspace_dir", "input_manifest", "output_manifest"] {
        check_optional_path(object.get(key), key, "Recipe")?;
    }

    if let Some(env) = object.get("env") {
        if !env.is_object() {
            return Err(invalid_type("env", "Recipe", "a mapping"));
        }
    }

    Ok(())
}

fn validate_step(step: &Value, index: usize, seen_ids: &mut HashSet<String>) -> Result<()> {
    let context = format!("Step {}", index);
    let Some(step) = step.as_object() else {
        return Err(PipelineError::recipe_with_code(
            ErrorCode::RECIPE_INVALID_TYPE,
            format!("{} must be a dictionary", context),
            None,
        ));
    };

    let step_type = step
        .get("type")
        .ok_or_else(|| missing_field("type", &context))?;
    match step_type.as_str() {
        Some(s) if !s.is_empty() => {}
        _ => return Err(invalid_type("type", &context, "a non-empty string")),
    }

    if let Some(params) = step.get("params") {
        if !params.is_object() {
            return Err(invalid_type("params", &context, "a dictionary"));
        }
    }

    if let Some(id) = step.get("id") {
        let Some(id) = id.as_str() else {
            return Err(invalid_type("id", &context, "a string"));
        };
        if !seen_ids.insert(id.to_string()) {
            return Err(PipelineError::recipe_with_code(
                ErrorCode::RECIPE_DUPLICATE_ID,
                format!("Duplicate step id: '{}'", id),
                Some("id".to_string()),
            ));
        }
    }

    if let Some(enabled) = step.get("enabled") {
        if !enabled.is_boolean() {
            return Err(invalid_type("enabled", &context, "a boolean"));
        }
    }

    for key in ["input_manifest", "output_manifest"] {
        check_optional_path(step.get(key), key, &context)?;
    }

    Ok(())
}

fn check_optional_path(value: Option<&Value>, key: &str, context: &str) -> Result<()> {
    match value {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(invalid_type(key, context, "a path string")),
    }
}

/// Resolve a `steps_to_run` selector into `(start, end)` step indices.
///
/// Omitted bounds resolve to `0` and `total_steps`. The returned bounds are not
/// clamped; see [`super::Recipe::selected_steps`].
pub fn parse_steps_to_run(value: &str, total_steps: usize) -> Result<(usize, usize)> {
    if value == ALL_STEPS {
        return Ok((0, total_steps));
    }

    let invalid = || {
        PipelineError::recipe_with_code(
            ErrorCode::RECIPE_INVALID_SLICE,
            format!("Invalid steps_to_run: '{}'", value),
            Some("steps_to_run".to_string()),
        )
    };

    let captures = SLICE_PATTERN.captures(value).ok_or_else(invalid)?;
    let bound = |index: usize, default: usize| -> Result<usize> {
        match captures.get(index).map(|m| m.as_str()) {
            Some(digits) if !digits.is_empty() => digits.parse().map_err(|_| invalid()),
            _ => Ok(default),
        }
    };

    Ok((bound(1, 0)?, bound(2, total_steps)?))
}
