use crate::error::Result;
use crate::manifest::{read_manifest, write_manifest, Record};
use crate::processor::{Processor, RunStats, StageIo};
use crate::registry::StageArgs;
use crate::runner::RunContext;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::path::Path;

/// Sorts the whole manifest by one field.
///
/// Loads every record into memory. The sort is stable in both directions, so
/// ties keep input order; records where the field is missing or null always
/// come last.
pub struct SortManifest {
    name: String,
    io: StageIo,
    attribute_sort_by: String,
    descending: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SortManifestParams {
    attribute_sort_by: String,
    #[serde(default = "default_descending")]
    descending: bool,
}

fn default_descending() -> bool {
    true
}

impl SortManifest {
    pub fn new(
        name: impl Into<String>,
        io: StageIo,
        attribute_sort_by: impl Into<String>,
        descending: bool,
    ) -> Self {
        Self {
            name: name.into(),
            io,
            attribute_sort_by: attribute_sort_by.into(),
            descending,
        }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        let io = args.io()?;
        let params: SortManifestParams = args.parse_params()?;
        Ok(Box::new(Self::new(
            args.name,
            io,
            params.attribute_sort_by,
            params.descending,
        )))
    }

    fn sort(&self, records: &mut [Record]) {
        let key = self.attribute_sort_by.as_str();
        records.sort_by(|a, b| {
            let a = a.get(key).filter(|v| !v.is_null());
            let b = b.get(key).filter(|v| !v.is_null());
            match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => {
                    let ordering = compare_json_values(a, b);
                    if self.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                }
            }
        });
    }
}

/// Total order over non-null JSON values: same-type values compare naturally,
/// mixed types order bool < number < string < array < object
fn compare_json_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()),
        (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[async_trait]
impl Processor for SortManifest {
    fn name(&self) -> &str {
        &self.name
    }

    fn io(&self) -> &StageIo {
        &self.io
    }

    async fn process(&self, _ctx: &RunContext, output: &Path) -> Result<RunStats> {
        let mut records = match self.io.input() {
            Some(input) => read_manifest(input).await?,
            None => Vec::new(),
        };
        let num_in = records.len() as u64;

        self.sort(&mut records);
        let written = write_manifest(output, &records).await? as u64;

        Ok(RunStats {
            num_in,
            num_out: written,
            ..RunStats::default()
        })
    }
}
