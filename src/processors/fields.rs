//! Field-level record edits

use super::build_map_stage;
use crate::error::{ErrorCode, PipelineError, Result};
use crate::manifest::Record;
use crate::processor::{Processor, RecordTransform, TransformResult};
use crate::registry::StageArgs;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Sets every key of `fields` on each record, overwriting existing values
#[derive(Debug, Clone, PartialEq)]
pub struct AddConstantFields {
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddConstantFieldsParams {
    fields: Map<String, Value>,
}

impl AddConstantFields {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |p: AddConstantFieldsParams| Ok(Self::new(p.fields)))
    }
}

impl RecordTransform for AddConstantFields {
    fn transform(&self, mut record: Record) -> Result<TransformResult> {
        for (key, value) in &self.fields {
            record.insert(key.clone(), value.clone());
        }
        Ok(TransformResult::keep(record))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropSpecifiedFields {
    fields_to_drop: HashSet<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DropSpecifiedFieldsParams {
    fields_to_drop: Vec<String>,
}

impl DropSpecifiedFields {
    pub fn new(fields: impl IntoIterator<Item = String>) -> Self {
        Self {
            fields_to_drop: fields.into_iter().collect(),
        }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |p: DropSpecifiedFieldsParams| {
            Ok(Self::new(p.fields_to_drop))
        })
    }
}

impl RecordTransform for DropSpecifiedFields {
    fn transform(&self, mut record: Record) -> Result<TransformResult> {
        record.retain(|key, _| !self.fields_to_drop.contains(key));
        Ok(TransformResult::keep(record))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeepOnlySpecifiedFields {
    fields_to_keep: HashSet<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct KeepOnlySpecifiedFieldsParams {
    fields_to_keep: Vec<String>,
}

impl KeepOnlySpecifiedFields {
    pub fn new(fields: impl IntoIterator<Item = String>) -> Self {
        Self {
            fields_to_keep: fields.into_iter().collect(),
        }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |p: KeepOnlySpecifiedFieldsParams| {
            Ok(Self::new(p.fields_to_keep))
        })
    }
}

impl RecordTransform for KeepOnlySpecifiedFields {
    fn transform(&self, mut record: Record) -> Result<TransformResult> {
        record.retain(|key, _| self.fields_to_keep.contains(key));
        Ok(TransformResult::keep(record))
    }
}

/// Renames keys in place; a renamed key keeps its position in the record
#[derive(Debug, Clone, PartialEq)]
pub struct RenameFields {
    rename_fields: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameFieldsParams {
    rename_fields: HashMap<String, String>,
}

impl RenameFields {
    pub fn new(rename_fields: HashMap<String, String>) -> Self {
        Self { rename_fields }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |p: RenameFieldsParams| Ok(Self::new(p.rename_fields)))
    }
}

impl RecordTransform for RenameFields {
    fn transform(&self, record: Record) -> Result<TransformResult> {
        let renamed: Record = record
            .into_iter()
            .map(|(key, value)| match self.rename_fields.get(&key) {
                Some(new_key) => (new_key.clone(), value),
                None => (key, value),
            })
            .collect();
        Ok(TransformResult::keep(renamed))
    }
}

/// Copies `source` to `target` for each pair, when the source key is present.
///
/// Pairs apply in the order they were given, so a later pair can copy a field
/// written by an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateFields {
    duplicate_fields: Vec<(String, String)>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DuplicateFieldsParams {
    duplicate_fields: Map<String, Value>,
}

impl DuplicateFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self {
            duplicate_fields: pairs,
        }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |p: DuplicateFieldsParams| {
            let pairs = p
                .duplicate_fields
                .into_iter()
                .map(|(source, target)| match target {
                    Value::String(target) => Ok((source, target)),
                    other => Err(PipelineError::configuration_with_code(
                        ErrorCode::CONFIG_INVALID_VALUE,
                        format!(
                            "duplicate_fields target for '{}' must be a string, got {}",
                            source, other
                        ),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Self::new(pairs))
        })
    }
}

impl RecordTransform for DuplicateFields {
    fn transform(&self, mut record: Record) -> Result<TransformResult> {
        for (source, target) in &self.duplicate_fields {
            if let Some(value) = record.get(source).cloned() {
                record.insert(target.clone(), value);
            }
        }
        Ok(TransformResult::keep(record))
    }
}

/// Emits every record unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassThrough;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

impl PassThrough {
    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |_: NoParams| Ok(PassThrough))
    }
}

impl RecordTransform for PassThrough {
    fn transform(&self, record: Record) -> Result<TransformResult> {
        Ok(TransformResult::keep(record))
    }
}
