//! Recipe model
//!
//! A recipe is the declarative description of a pipeline: an ordered list of
//! steps plus optional recipe-level manifests, workspace and environment. It is
//! loaded and validated once per run and read-only afterwards.

mod validation;

pub use validation::{parse_steps_to_run, validate_recipe, ALL_STEPS};

use crate::error::{ErrorCode, ErrorExt, PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Recipe schema version written by [`save_recipe`]
pub const RECIPE_VERSION: &str = "0.1";

/// A validated pipeline description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default = "default_steps_to_run")]
    pub steps_to_run: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_manifest: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_manifest: Option<PathBuf>,
    /// Opaque values handed to every stage through the run context
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub env: Map<String, Value>,
}

/// One stage of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Registered processor name or qualified processor path
    #[serde(rename = "type")]
    pub processor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_manifest: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_manifest: Option<PathBuf>,
}

fn default_steps_to_run() -> String {
    ALL_STEPS.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            version: Some(RECIPE_VERSION.to_string()),
            name: None,
            steps: Vec::new(),
            steps_to_run: default_steps_to_run(),
            workspace_dir: None,
            input_manifest: None,
            output_manifest: None,
            env: Map::new(),
        }
    }
}

impl Step {
    pub fn new(processor_type: impl Into<String>) -> Self {
        Self {
            processor_type: processor_type.into(),
            id: None,
            params: Map::new(),
            enabled: true,
            input_manifest: None,
            output_manifest: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Identifier used for a step in diagnostics and temp file names
pub fn step_id(step: &Step, index: usize) -> String {
    step.id.clone().unwrap_or_else(|| format!("step_{}", index))
}

impl Recipe {
    /// Validate a raw document and convert it into a typed recipe
    pub fn from_value(value: Value) -> Result<Self> {
        validate_recipe(&value)?;
        serde_json::from_value(value).map_err(|e| {
            PipelineError::recipe_with_code(
                ErrorCode::RECIPE_INVALID_TYPE,
                format!("Recipe does not match the expected schema: {}", e),
                None,
            )
            .with_source(e)
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| {
            PipelineError::recipe_with_code(
                ErrorCode::RECIPE_INVALID_JSON,
                format!("Invalid JSON in recipe: {}", e),
                None,
            )
            .with_source(e)
        })?;
        Self::from_value(value)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| {
            PipelineError::recipe_with_code(
                ErrorCode::RECIPE_INVALID_YAML,
                format!("Invalid YAML in recipe: {}", e),
                None,
            )
            .with_source(e)
        })?;
        Self::from_value(value)
    }

    /// Re-run validation on a recipe built in code
    pub fn validate(&self) -> Result<()> {
        let value = serde_json::to_value(self).to_recipe_error("Failed to serialize recipe")?;
        validate_recipe(&value)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Steps picked by `steps_to_run` and `enabled`, with their original indices.
    ///
    /// Slice bounds past the end are clamped and an inverted slice selects
    /// nothing, matching half-open slice semantics.
    pub fn selected_steps(&self) -> Result<Vec<(usize, &Step)>> {
        let total = self.steps.len();
        let (start, end) = parse_steps_to_run(&self.steps_to_run, total)?;
        let end = end.min(total);
        let start = start.min(end);

        Ok(self.steps[start..end]
            .iter()
            .enumerate()
            .map(|(offset, step)| (start + offset, step))
            .filter(|(_, step)| step.enabled)
            .collect())
    }
}

/// Load and validate a recipe file (JSON, or YAML for `.yml`/`.yaml`)
pub fn load_recipe(path: impl AsRef<Path>) -> Result<Recipe> {
    let path = path.as_ref();
    debug!("Loading recipe from {}", path.display());

    if !path.exists() {
        return Err(PipelineError::recipe_with_code(
            ErrorCode::RECIPE_NOT_FOUND,
            format!("Recipe file not found: {}", path.display()),
            None,
        ));
    }

    let content = std::fs::read_to_string(path)
        .to_recipe_error(format!("Failed to read recipe {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));

    if is_yaml {
        Recipe::from_yaml_str(&content)
    } else {
        Recipe::from_json_str(&content)
    }
}

/// Write a recipe as pretty JSON with a trailing newline
pub fn save_recipe(recipe: &Recipe, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .to_recipe_error(format!("Failed to create {}", parent.display()))?;
    }

    let mut content =
        serde_json::to_string_pretty(recipe).to_recipe_error("Failed to serialize recipe")?;
    content.push('\n');
    std::fs::write(path, content).to_recipe_error(format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn four_steps() -> Recipe {
        Recipe {
            steps: vec![
                Step::new("PassThrough").with_id("a"),
                Step::new("PassThrough").with_id("b"),
                Step::new("PassThrough").with_id("c"),
                Step::new("PassThrough").with_id("d"),
            ],
            ..Recipe::default()
        }
    }

    fn selected_ids(recipe: &Recipe) -> Vec<(usize, String)> {
        recipe
            .selected_steps()
            .unwrap()
            .into_iter()
            .map(|(i, s)| (i, step_id(s, i)))
            .collect()
    }

    #[test]
    fn test_from_value_applies_defaults() {
        let recipe = Recipe::from_value(json!({"steps": [{"type": "PassThrough"}]})).unwrap();
        assert_eq!(recipe.steps_to_run, "all");
        assert!(recipe.steps[0].enabled);
        assert!(recipe.steps[0].params.is_empty());
        assert_eq!(recipe.display_name(), "unnamed");
    }

    #[test]
    fn test_from_value_rejects_invalid() {
        let err = Recipe::from_value(json!({"steps": [{"id": "x"}]})).unwrap_err();
        assert!(err.is_recipe_invalid());
    }

    #[test]
    fn test_slice_selects_half_open_range() {
        let mut recipe = four_steps();
        recipe.steps_to_run = "1:3".to_string();
        assert_eq!(
            selected_ids(&recipe),
            vec![(1, "b".to_string()), (2, "c".to_string())]
        );
    }

    #[test]
    fn test_disabled_steps_keep_original_indices() {
        let mut recipe = four_steps();
        recipe.steps[1].enabled = false;
        recipe.steps[3].id = None;
        assert_eq!(
            selected_ids(&recipe),
            vec![
                (0, "a".to_string()),
                (2, "c".to_string()),
                (3, "step_3".to_string())
            ]
        );
    }

    #[test]
    fn test_out_of_range_slices_clamp() {
        let mut recipe = four_steps();
        recipe.steps_to_run = "2:10".to_string();
        assert_eq!(selected_ids(&recipe).len(), 2);

        recipe.steps_to_run = "3:1".to_string();
        assert!(selected_ids(&recipe).is_empty());

        recipe.steps_to_run = "7:".to_string();
        assert!(selected_ids(&recipe).is_empty());
    }

    #[test]
    fn test_load_json_and_yaml() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("recipe.json");
        std::fs::write(
            &json_path,
            r#"{"name": "demo", "steps": [{"type": "PassThrough", "id": "p"}]}"#,
        )
        .unwrap();
        let recipe = load_recipe(&json_path).unwrap();
        assert_eq!(recipe.display_name(), "demo");

        let yaml_path = dir.path().join("recipe.yaml");
        std::fs::write(
            &yaml_path,
            "name: demo\nsteps:\n  - type: PassThrough\n    id: p\n",
        )
        .unwrap();
        assert_eq!(load_recipe(&yaml_path).unwrap(), recipe);
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let err = load_recipe(dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_NOT_FOUND);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let err = load_recipe(&bad).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_INVALID_JSON);

        let array = dir.path().join("array.json");
        std::fs::write(&array, "[1, 2]").unwrap();
        assert!(load_recipe(&array).unwrap_err().is_recipe_invalid());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/recipe.json");
        let mut recipe = four_steps();
        recipe.name = Some("saved".to_string());
        recipe.steps[0] = recipe.steps[0]
            .clone()
            .with_param("fields", json!({"k": "v"}));
        recipe.input_manifest = Some(PathBuf::from("in.jsonl"));

        save_recipe(&recipe, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("}\n"));
        assert_eq!(load_recipe(&path).unwrap(), recipe);
    }
}
