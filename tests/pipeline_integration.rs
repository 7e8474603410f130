//! End-to-end pipeline tests through the public library API

use minidp::config::RunnerConfig;
use minidp::error::ErrorCode;
use minidp::manifest::{read_manifest, write_manifest};
use minidp::processor::{MapStage, Processor};
use minidp::processors::build_map_stage;
use minidp::runner::default_output_path;
use minidp::{
    PipelineRunner, ProcessorRegistry, Recipe, Record, RecordTransform, Registration, Result,
    StageArgs, Step, TransformResult,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// Splits a whitespace-separated `text` field into one record per word
struct SplitWords;

impl RecordTransform for SplitWords {
    fn transform(&self, record: Record) -> Result<TransformResult> {
        let text = record
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let words = text.split_whitespace().map(|word| {
            let mut out = record.clone();
            out.insert("text".to_string(), json!(word));
            out
        });
        Ok(TransformResult::expand(words))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PrefixParams {
    field: String,
    prefix: String,
}

struct AddPrefix(PrefixParams);

impl RecordTransform for AddPrefix {
    fn transform(&self, mut record: Record) -> Result<TransformResult> {
        if let Some(value) = record.get(&self.0.field) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            record.insert(self.0.field.clone(), json!(format!("{}{}", self.0.prefix, text)));
        }
        Ok(TransformResult::keep(record))
    }
}

fn registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::with_builtins().unwrap();
    registry
        .register(
            "SplitWords",
            Registration::new("Emits one record per word of `text`", |mut args: StageArgs| {
                let options = args.take_execution_options()?;
                let io = args.io()?;
                Ok(Box::new(MapStage::new(args.name, io, SplitWords).with_options(options))
                    as Box<dyn Processor>)
            })
            .exported_at("custom::SplitWords"),
        )
        .unwrap();
    registry
        .register(
            "AddPrefix",
            Registration::new("Prefixes one field", |args: StageArgs| {
                build_map_stage(args, |p: PrefixParams| Ok(AddPrefix(p)))
            }),
        )
        .unwrap();
    registry
}

fn config(dir: &Path) -> RunnerConfig {
    RunnerConfig {
        workspace_dir: dir.join("ws"),
        ..RunnerConfig::default()
    }
}

async fn seed(path: &Path, values: Vec<Value>) {
    let records: Vec<Record> = values
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
    write_manifest(path, &records).await.unwrap();
}

fn texts(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["text"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_custom_processors_chain() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    let output = dir.path().join("out.jsonl");
    seed(
        &input,
        vec![
            json!({"id": 1, "text": "a b"}),
            json!({"id": 2, "text": ""}),
            json!({"id": 3, "text": "c"}),
        ],
    )
    .await;

    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path()));
    let recipe = Recipe {
        input_manifest: Some(input),
        output_manifest: Some(output.clone()),
        steps: vec![
            Step::new("custom.SplitWords").with_id("split"),
            Step::new("AddPrefix")
                .with_param("field", json!("text"))
                .with_param("prefix", json!(">")),
        ],
        ..Recipe::default()
    };

    let summary = runner.run_with_summary(&recipe).await.unwrap();
    assert_eq!(summary.steps[0].stats.counts(), (3, 3, 1, 1));
    assert_eq!(summary.steps[1].stats.counts(), (3, 3, 0, 0));
    assert_eq!(texts(&read_manifest(&output).await.unwrap()), vec![">a", ">b", ">c"]);
}

#[tokio::test]
async fn test_config_default_workers_match_sequential() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    let values = (0..250)
        .map(|i| json!({"id": i, "text": format!("w{} x{}", i, i)}))
        .collect();
    seed(&input, values).await;

    let registry = registry();
    let recipe_for = |out: &str| Recipe {
        input_manifest: Some(input.clone()),
        output_manifest: Some(dir.path().join(out)),
        steps: vec![Step::new("SplitWords")],
        ..Recipe::default()
    };

    let sequential = PipelineRunner::new(&registry, config(dir.path()));
    let seq = sequential.run_with_summary(&recipe_for("seq.jsonl")).await.unwrap();

    let parallel_config = RunnerConfig {
        default_workers: 4,
        default_chunk_size: 16,
        ..config(dir.path())
    };
    let parallel = PipelineRunner::new(&registry, parallel_config);
    let par = parallel.run_with_summary(&recipe_for("par.jsonl")).await.unwrap();

    assert_eq!(seq.steps[0].stats.counts(), par.steps[0].stats.counts());
    assert_eq!(
        std::fs::read(dir.path().join("seq.jsonl")).unwrap(),
        std::fs::read(dir.path().join("par.jsonl")).unwrap()
    );
}

#[tokio::test]
async fn test_steps_to_run_slice() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    seed(&input, vec![json!({"text": "x"})]).await;

    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path()));
    let add = |key: &str| {
        Step::new("AddConstantFields")
            .with_id(key)
            .with_param("fields", json!({ key: true }))
    };
    let recipe = Recipe {
        input_manifest: Some(input),
        steps: vec![add("a"), add("b"), add("c"), add("d")],
        steps_to_run: "1:3".to_string(),
        ..Recipe::default()
    };

    let summary = runner.run_with_summary(&recipe).await.unwrap();
    let ids: Vec<&str> = summary.steps.iter().map(|s| s.step_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
    assert_eq!(
        summary.final_output,
        default_output_path(&dir.path().join("ws"), &summary.run_id)
    );
    assert_eq!(read_manifest(&summary.final_output).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_kept_temps_form_the_chain() {
    let dir = TempDir::new().unwrap();
    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path())).with_keep_temps(true);
    let recipe = Recipe {
        steps: vec![
            Step::new("AddConstantFields")
                .with_id("A")
                .with_param("fields", json!({"k": 1})),
            Step::new("PassThrough").with_id("B"),
        ],
        ..Recipe::default()
    };

    let summary = runner.run_with_summary(&recipe).await.unwrap();
    let tmp = dir.path().join("ws/.tmp").join(&summary.run_id);
    assert_eq!(summary.steps[0].input, None);
    assert_eq!(summary.steps[0].output, tmp.join("A_output.jsonl"));
    assert_eq!(summary.steps[1].input, Some(tmp.join("A_output.jsonl")));
    assert_eq!(
        summary.final_output,
        default_output_path(&dir.path().join("ws"), &summary.run_id)
    );
    assert!(read_manifest(&summary.final_output).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_same_input_output_rejected_before_io() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("same.jsonl");
    seed(&path, vec![json!({"text": "keep me"})]).await;

    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path()));
    let mut step = Step::new("PassThrough").with_id("loop");
    step.input_manifest = Some(path.clone());
    step.output_manifest = Some(path.clone());
    let recipe = Recipe {
        steps: vec![step],
        ..Recipe::default()
    };

    let err = runner.run(&recipe).await.unwrap_err();
    assert!(err.developer_message().contains("must not be equal"));
    assert_eq!(texts(&read_manifest(&path).await.unwrap()), vec!["keep me"]);
}

#[tokio::test]
async fn test_all_drop_stage() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.jsonl");
    seed(&input, vec![json!({"lang": "en"}), json!({"lang": "de"})]).await;

    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path()));
    let recipe = Recipe {
        input_manifest: Some(input),
        output_manifest: Some(dir.path().join("out.jsonl")),
        steps: vec![Step::new("FilterByField")
            .with_param("field", json!("lang"))
            .with_param("values", json!(["xx"]))],
        ..Recipe::default()
    };

    let summary = runner.run_with_summary(&recipe).await.unwrap();
    let stats = &summary.steps[0].stats;
    assert_eq!(stats.dropped, stats.num_in);
    assert_eq!(stats.num_out, 0);
}

#[tokio::test]
async fn test_bad_params_surface_as_registry_error() {
    let dir = TempDir::new().unwrap();
    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path()));
    let recipe = Recipe {
        steps: vec![Step::new("AddPrefix").with_param("field", json!("text"))],
        ..Recipe::default()
    };

    let err = runner.run(&recipe).await.unwrap_err();
    assert!(err.is_registry());
    assert_eq!(err.code(), ErrorCode::REGISTRY_CONSTRUCTION_FAILED);
}

#[tokio::test]
async fn test_yaml_recipe_runs() {
    let dir = TempDir::new().unwrap();
    let recipe_path = dir.path().join("recipe.yaml");
    let output = dir.path().join("out.jsonl");
    std::fs::write(
        &recipe_path,
        format!(
            "name: yaml\noutput_manifest: {}\nsteps:\n  - type: AddConstantFields\n    params:\n      fields:\n        source: yaml\n",
            output.display()
        ),
    )
    .unwrap();

    let recipe = minidp::load_recipe(&recipe_path).unwrap();
    let registry = registry();
    let runner = PipelineRunner::new(&registry, config(dir.path()));
    assert_eq!(runner.run(&recipe).await.unwrap(), output);
}
