use super::build_map_stage;
use crate::error::Result;
use crate::manifest::Record;
use crate::processor::{Processor, RecordTransform, TransformResult};
use crate::registry::StageArgs;
use serde::Deserialize;
use serde_json::Value;

/// Keeps records whose `field` is one of `values`, or drops them when
/// `exclude` is set. A missing field compares as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterByField {
    field: String,
    values: Vec<Value>,
    exclude: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterByFieldParams {
    field: String,
    values: Vec<Value>,
    #[serde(default)]
    exclude: bool,
}

impl FilterByField {
    pub fn new(field: impl Into<String>, values: Vec<Value>, exclude: bool) -> Self {
        Self {
            field: field.into(),
            values,
            exclude,
        }
    }

    pub fn factory(args: StageArgs) -> Result<Box<dyn Processor>> {
        build_map_stage(args, |p: FilterByFieldParams| {
            Ok(Self::new(p.field, p.values, p.exclude))
        })
    }

    fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.field).unwrap_or(&Value::Null);
        self.values.iter().any(|candidate| values_equal(candidate, value))
    }
}

/// JSON equality where numbers compare by value, so `1` matches `1.0`
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

impl RecordTransform for FilterByField {
    fn transform(&self, record: Record) -> Result<TransformResult> {
        if self.matches(&record) != self.exclude {
            Ok(TransformResult::keep(record))
        } else {
            Ok(TransformResult::drop_record())
        }
    }
}
