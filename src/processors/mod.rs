//! Built-in stages
//!
//! Every built-in is registered under its type name and exported at
//! `minidp::processors::<Name>`.

mod fields;
mod filter;
mod sort;

pub use fields::{
    AddConstantFields, DropSpecifiedFields, DuplicateFields, KeepOnlySpecifiedFields, PassThrough,
    RenameFields,
};
pub use filter::FilterByField;
pub use sort::SortManifest;

use crate::error::Result;
use crate::processor::{MapStage, Processor, RecordTransform};
use crate::registry::{ProcessorRegistry, Registration, StageArgs};
use serde::de::DeserializeOwned;

/// Qualified path prefix of the built-in stages
pub const BUILTIN_NAMESPACE: &str = "minidp::processors";

/// Build a map stage: executor params first, then I/O, then typed params
pub fn build_map_stage<P, T>(
    mut args: StageArgs,
    build: impl FnOnce(P) -> Result<T>,
) -> Result<Box<dyn Processor>>
where
    P: DeserializeOwned,
    T: RecordTransform,
{
    let options = args.take_execution_options()?;
    let io = args.io()?;
    let params: P = args.parse_params()?;
    let transform = build(params)?;
    Ok(Box::new(
        MapStage::new(args.name, io, transform).with_options(options),
    ))
}

fn builtin(name: &str, description: &str, factory: fn(StageArgs) -> Result<Box<dyn Processor>>) -> (String, Registration) {
    (
        name.to_string(),
        Registration::new(description, factory).exported_at(format!("{}::{}", BUILTIN_NAMESPACE, name)),
    )
}

/// Register every built-in stage
pub fn register_builtins(registry: &mut ProcessorRegistry) -> Result<()> {
    let builtins = [
        builtin(
            "AddConstantFields",
            "Adds the same fields to every record",
            AddConstantFields::factory,
        ),
        builtin(
            "DropSpecifiedFields",
            "Removes the listed fields from every record",
            DropSpecifiedFields::factory,
        ),
        builtin(
            "KeepOnlySpecifiedFields",
            "Keeps only the listed fields of every record",
            KeepOnlySpecifiedFields::factory,
        ),
        builtin(
            "RenameFields",
            "Renames fields, keeping their position in the record",
            RenameFields::factory,
        ),
        builtin(
            "DuplicateFields",
            "Copies field values to new keys",
            DuplicateFields::factory,
        ),
        builtin(
            "FilterByField",
            "Keeps or excludes records by the value of one field",
            FilterByField::factory,
        ),
        builtin(
            "PassThrough",
            "Copies every record unchanged",
            PassThrough::factory,
        ),
        builtin(
            "SortManifest",
            "Sorts the whole manifest by one field",
            SortManifest::factory,
        ),
    ];

    for (name, registration) in builtins {
        registry.register(name, registration)?;
    }
    Ok(())
}
