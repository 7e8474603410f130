//! Processor registry
//!
//! Maps step `type` strings to stage factories. A type is either a registered
//! name (`RenameFields`) or the qualified path a registration exports
//! (`minidp::processors::RenameFields`, also accepted as
//! `minidp.processors.RenameFields`). The registry is an explicit value handed
//! to the runner, so tests and embedders can build their own.

use crate::error::{ErrorCode, PipelineError, Result};
use crate::processor::{ExecutionOptions, Processor, StageIo};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Builds a stage from its resolved arguments
pub type ProcessorFactory = Arc<dyn Fn(StageArgs) -> Result<Box<dyn Processor>> + Send + Sync>;

/// Everything a factory needs to construct one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageArgs {
    /// Step id, used as the stage name
    pub name: String,
    pub input_manifest: Option<PathBuf>,
    pub output_manifest: Option<PathBuf>,
    pub params: Map<String, Value>,
    /// Worker and chunk defaults for map stages that don't set their own
    pub defaults: ExecutionOptions,
}

impl StageArgs {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_manifest = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_manifest = Some(path.into());
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_defaults(mut self, defaults: ExecutionOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Validated manifest paths
    pub fn io(&self) -> Result<StageIo> {
        StageIo::new(self.input_manifest.clone(), self.output_manifest.clone())
    }

    /// Strip the executor params and return the resulting options
    pub fn take_execution_options(&mut self) -> Result<ExecutionOptions> {
        ExecutionOptions::take_from_params(&mut self.params, self.defaults)
    }

    /// Deserialize the remaining params into a typed struct
    pub fn parse_params<P: DeserializeOwned>(&self) -> Result<P> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            PipelineError::registry_with_code(
                ErrorCode::REGISTRY_CONSTRUCTION_FAILED,
                format!("Invalid params: {}", e),
                None,
            )
            .with_source(e)
        })
    }
}

/// A registered processor type
#[derive(Clone)]
pub struct Registration {
    description: String,
    qualified_path: Option<String>,
    factory: ProcessorFactory,
}

impl Registration {
    pub fn new<F>(description: impl Into<String>, factory: F) -> Self
    where
        F: Fn(StageArgs) -> Result<Box<dyn Processor>> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            qualified_path: None,
            factory: Arc::new(factory),
        }
    }

    /// Also resolve this registration through a `::`-separated path
    pub fn exported_at(mut self, path: impl Into<String>) -> Self {
        self.qualified_path = Some(normalize_path(&path.into()));
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn qualified_path(&self) -> Option<&str> {
        self.qualified_path.as_deref()
    }

    pub fn build(&self, args: StageArgs) -> Result<Box<dyn Processor>> {
        (self.factory)(args)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("description", &self.description)
            .field("qualified_path", &self.qualified_path)
            .finish_non_exhaustive()
    }
}

/// Name → factory table
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    entries: BTreeMap<String, Registration>,
    paths: HashMap<String, String>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in stages
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        crate::processors::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// Bind `name`; fails if the name or its qualified path is already bound
    pub fn register(&mut self, name: impl Into<String>, registration: Registration) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(PipelineError::registry_with_code(
                ErrorCode::REGISTRY_ALREADY_REGISTERED,
                format!("Processor '{}' is already registered", name),
                Some(name),
            ));
        }

        if let Some(path) = registration.qualified_path() {
            if let Some(owner) = self.paths.get(path) {
                return Err(PipelineError::registry_with_code(
                    ErrorCode::REGISTRY_ALREADY_REGISTERED,
                    format!("Path '{}' is already exported by '{}'", path, owner),
                    Some(name),
                ));
            }
            self.paths.insert(path.to_string(), name.clone());
        }

        debug!("Registered processor {}", name);
        self.entries.insert(name, registration);
        Ok(())
    }

    /// Remove a binding, returning it if it existed
    pub fn unregister(&mut self, name: &str) -> Option<Registration> {
        let registration = self.entries.remove(name)?;
        if let Some(path) = registration.qualified_path() {
            self.paths.remove(path);
        }
        Some(registration)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up a registered name or qualified path
    pub fn resolve(&self, name_or_path: &str) -> Result<&Registration> {
        if let Some(registration) = self.entries.get(name_or_path) {
            return Ok(registration);
        }

        if name_or_path.contains("::") || name_or_path.contains('.') {
            let path = normalize_path(name_or_path);
            return self
                .paths
                .get(&path)
                .and_then(|name| self.entries.get(name))
                .ok_or_else(|| {
                    PipelineError::registry_with_code(
                        ErrorCode::REGISTRY_PATH_NOT_FOUND,
                        format!("Cannot resolve processor path '{}'", name_or_path),
                        Some(name_or_path.to_string()),
                    )
                });
        }

        let available: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        Err(PipelineError::registry_with_code(
            ErrorCode::REGISTRY_NOT_FOUND,
            format!(
                "Unknown processor type '{}'. Available: [{}]",
                name_or_path,
                available.join(", ")
            ),
            Some(name_or_path.to_string()),
        ))
    }

    /// Resolve and construct a stage
    pub fn create(&self, name_or_path: &str, args: StageArgs) -> Result<Box<dyn Processor>> {
        let registration = self.resolve(name_or_path)?;
        registration.build(args).map_err(|e| {
            PipelineError::registry_with_code(
                ErrorCode::REGISTRY_CONSTRUCTION_FAILED,
                format!(
                    "Failed to construct processor '{}': {}",
                    name_or_path,
                    e.user_message()
                ),
                Some(name_or_path.to_string()),
            )
            .with_source(e)
        })
    }

    /// `(name, description)` pairs sorted by name
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|(name, registration)| (name.as_str(), registration.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('.', "::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Record;
    use crate::processor::{MapStage, RecordTransform, TransformResult};
    use serde::Deserialize;
    use serde_json::json;
    use std::error::Error;

    struct Identity;

    impl RecordTransform for Identity {
        fn transform(&self, record: Record) -> Result<TransformResult> {
            Ok(TransformResult::keep(record))
        }
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct IdentityParams {
        #[serde(default)]
        #[allow(dead_code)]
        tag: Option<String>,
    }

    fn identity() -> Registration {
        Registration::new("Returns every record unchanged", |mut args: StageArgs| {
            let options = args.take_execution_options()?;
            let io = args.io()?;
            let _params: IdentityParams = args.parse_params()?;
            Ok(Box::new(MapStage::new(args.name, io, Identity).with_options(options))
                as Box<dyn Processor>)
        })
        .exported_at("my_crate::stages::Identity")
    }

    fn registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        registry.register("Identity", identity()).unwrap();
        registry
    }

    fn args() -> StageArgs {
        StageArgs::new("s").with_output("out.jsonl")
    }

    #[test]
    fn test_register_and_resolve_by_name() {
        let registry = registry();
        assert!(registry.contains("Identity"));
        let stage = registry.create("Identity", args()).unwrap();
        assert_eq!(stage.name(), "s");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = registry();
        let err = registry.register("Identity", identity()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::REGISTRY_ALREADY_REGISTERED);

        let err = registry.register("Other", identity()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::REGISTRY_ALREADY_REGISTERED);
    }

    #[test]
    fn test_resolve_qualified_path() {
        let registry = registry();
        assert!(registry.resolve("my_crate::stages::Identity").is_ok());
        assert!(registry.resolve("my_crate.stages.Identity").is_ok());

        let err = registry.resolve("my_crate::stages::Missing").unwrap_err();
        assert_eq!(err.code(), ErrorCode::REGISTRY_PATH_NOT_FOUND);
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let registry = registry();
        let err = registry.resolve("Nope").unwrap_err();
        assert!(err.is_registry());
        assert!(err.to_string().contains("Available: [Identity]"));
    }

    #[test]
    fn test_unregister_removes_path() {
        let mut registry = registry();
        assert!(registry.unregister("Identity").is_some());
        assert!(registry.unregister("Identity").is_none());
        assert!(registry.resolve("my_crate::stages::Identity").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_construction_errors_are_registry_errors_with_cause() {
        let registry = registry();

        let bad_params = args().with_params(json!({"bogus": 1}).as_object().cloned().unwrap());
        let err = registry.create("Identity", bad_params).err().unwrap();
        assert!(err.is_registry());
        assert_eq!(err.code(), ErrorCode::REGISTRY_CONSTRUCTION_FAILED);

        let same = StageArgs::new("s")
            .with_input("same.jsonl")
            .with_output("same.jsonl");
        let err = registry.create("Identity", same).err().unwrap();
        assert!(err.is_registry());
        let cause = err
            .source()
            .and_then(|s| s.downcast_ref::<PipelineError>())
            .unwrap();
        assert!(cause.is_configuration());
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = registry();
        registry
            .register("Alpha", Registration::new("first", |_| Err(PipelineError::registry("unused"))))
            .unwrap();
        let names: Vec<&str> = registry.list().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Alpha", "Identity"]);
    }
}
