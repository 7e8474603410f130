//! Streaming single-worker executor

use super::{RecordTransform, RunStats};
use crate::error::{ErrorCode, PipelineError, Result};
use crate::manifest::{ManifestReader, ManifestWriter};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::trace;

/// Apply `transform` to every record of `reader`, writing kept records in order
pub async fn run<T>(transform: &T, mut reader: ManifestReader, mut writer: ManifestWriter) -> Result<RunStats>
where
    T: RecordTransform + ?Sized,
{
    let mut stats = RunStats::default();
    let mut kept = Vec::new();

    while let Some(record) = reader.next_record().await? {
        let ordinal = stats.num_in + 1;
        let result = catch_unwind(AssertUnwindSafe(|| transform.transform(record)))
            .unwrap_or_else(|payload| Err(transform_panicked(payload.as_ref())))
            .map_err(|e| record_failure(ordinal, e))?;
        stats.absorb(result, &mut kept);

        for record in kept.drain(..) {
            writer.write(&record).await?;
        }
    }

    let written = writer.finish().await?;
    trace!(written, "Sequential executor finished");
    Ok(stats)
}

/// Error for a transform that failed on the `ordinal`-th input record (1-based)
pub(crate) fn record_failure(ordinal: u64, err: PipelineError) -> PipelineError {
    PipelineError::processor_with_code(
        ErrorCode::PROCESSOR_RECORD_FAILED,
        format!("Error processing record {}: {}", ordinal, err.user_message()),
    )
    .with_record(ordinal)
    .with_source(err)
}

/// Error for a transform that panicked instead of returning
pub(crate) fn transform_panicked(payload: &(dyn Any + Send)) -> PipelineError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    PipelineError::processor_with_code(
        ErrorCode::PROCESSOR_WORKER_FAILED,
        format!("Transform panicked: {}", detail),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{read_manifest, write_manifest, Record};
    use crate::processor::TransformResult;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    struct EveryOther;

    impl RecordTransform for EveryOther {
        fn transform(&self, record: Record) -> Result<TransformResult> {
            let i = record["i"].as_i64().unwrap_or_default();
            if i % 2 == 0 {
                Ok(TransformResult::keep(record))
            } else {
                Ok(TransformResult::drop_record())
            }
        }
    }

    struct FailAt(i64);

    impl RecordTransform for FailAt {
        fn transform(&self, record: Record) -> Result<TransformResult> {
            if record["i"] == json!(self.0) {
                return Err(PipelineError::processor("boom"));
            }
            Ok(TransformResult::keep(record))
        }
    }

    struct PanicAt(i64);

    impl RecordTransform for PanicAt {
        fn transform(&self, record: Record) -> Result<TransformResult> {
            if record["i"] == json!(self.0) {
                panic!("bad record {}", self.0);
            }
            Ok(TransformResult::keep(record))
        }
    }

    async fn seed(path: &Path, n: i64) {
        let records: Vec<Record> = (0..n)
            .map(|i| json!({"i": i}).as_object().cloned().unwrap())
            .collect();
        write_manifest(path, &records).await.unwrap();
    }

    #[tokio::test]
    async fn test_streams_and_counts() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        let output = dir.path().join("out.jsonl");
        seed(&input, 5).await;

        let reader = ManifestReader::open(&input).await.unwrap();
        let writer = ManifestWriter::create(&output).await.unwrap();
        let stats = run(&EveryOther, reader, writer).await.unwrap();

        assert_eq!(stats.counts(), (5, 3, 2, 0));
        let out = read_manifest(&output).await.unwrap();
        let ids: Vec<_> = out.iter().map(|r| r["i"].clone()).collect();
        assert_eq!(ids, vec![json!(0), json!(2), json!(4)]);
    }

    #[tokio::test]
    async fn test_failure_names_ordinal_and_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        let output = dir.path().join("out.jsonl");
        seed(&input, 5).await;

        let reader = ManifestReader::open(&input).await.unwrap();
        let writer = ManifestWriter::create(&output).await.unwrap();
        let err = run(&FailAt(2), reader, writer).await.unwrap_err();

        assert_eq!(err.record(), Some(3));
        assert_eq!(err.code(), ErrorCode::PROCESSOR_RECORD_FAILED);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_panicking_transform_becomes_record_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jsonl");
        let output = dir.path().join("out.jsonl");
        seed(&input, 4).await;

        let reader = ManifestReader::open(&input).await.unwrap();
        let writer = ManifestWriter::create(&output).await.unwrap();
        let err = run(&PanicAt(1), reader, writer).await.unwrap_err();

        assert!(err.is_processor());
        assert_eq!(err.record(), Some(2));
        assert_eq!(err.code(), ErrorCode::PROCESSOR_RECORD_FAILED);
        assert!(err.to_string().contains("bad record 1"), "{err}");
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_empty_input_writes_empty_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.jsonl");

        let writer = ManifestWriter::create(&output).await.unwrap();
        let stats = run(&EveryOther, ManifestReader::empty(), writer).await.unwrap();

        assert_eq!(stats.counts(), (0, 0, 0, 0));
        assert!(output.exists());
        assert!(read_manifest(&output).await.unwrap().is_empty());
    }
}
