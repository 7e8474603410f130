//! JSONL manifest storage
//!
//! A manifest is an ordered sequence of JSON objects, one per line. Reading is
//! streaming: callers pull one record at a time and memory stays bounded by a
//! single line. A missing or zero-length file reads as an empty manifest, which
//! is how the first stage of a pipeline creates data from nothing.
//!
//! Writes go to a sibling `.partial` file that is renamed over the destination
//! on [`ManifestWriter::finish`], so a failed stage never leaves a truncated
//! manifest at the published path.

use crate::error::{ErrorCode, ErrorExt, PipelineError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tracing::{debug, trace};

/// A single manifest record
pub type Record = serde_json::Map<String, Value>;

/// Returns true if `path` exists and has non-zero length
pub async fn is_nonempty_file(path: impl AsRef<Path>) -> bool {
    match tokio::fs::metadata(path.as_ref()).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Streaming reader over a JSONL manifest
pub struct ManifestReader {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_number: u64,
}

impl ManifestReader {
    /// Open a manifest for reading.
    ///
    /// Missing and empty files yield a reader that produces no records.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !is_nonempty_file(&path).await {
            debug!("Manifest {} is missing or empty, reading as empty", path.display());
            return Ok(Self {
                path,
                lines: None,
                line_number: 0,
            });
        }

        let file = File::open(&path).await.to_manifest_error(
            ErrorCode::MANIFEST_READ_FAILED,
            "Failed to open manifest",
            &path,
        )?;

        Ok(Self {
            path,
            lines: Some(BufReader::new(file).lines()),
            line_number: 0,
        })
    }

    /// A reader that yields nothing, for stages without an input manifest
    pub fn empty() -> Self {
        Self {
            path: PathBuf::new(),
            lines: None,
            line_number: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the most recently read line (1-based)
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Read the next record, skipping blank lines
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };

        loop {
            let line = lines.next_line().await.to_manifest_error(
                ErrorCode::MANIFEST_READ_FAILED,
                format!("Failed to read manifest after line {}", self.line_number),
                &self.path,
            )?;

            let Some(line) = line else {
                self.lines = None;
                return Ok(None);
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return parse_line(trimmed, &self.path, self.line_number).map(Some);
        }
    }

    /// Read up to `limit` records
    pub async fn next_chunk(&mut self, limit: usize) -> Result<Vec<Record>> {
        let mut chunk = Vec::with_capacity(limit.min(1024));
        while chunk.len() < limit {
            match self.next_record().await? {
                Some(record) => chunk.push(record),
                None => break,
            }
        }
        Ok(chunk)
    }
}

fn parse_line(line: &str, path: &Path, line_number: u64) -> Result<Record> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        PipelineError::manifest_with_code(
            ErrorCode::MANIFEST_INVALID_LINE,
            format!("Invalid JSON: {}", e),
            Some(path.to_path_buf()),
        )
        .with_line(line_number)
        .with_source(e)
    })?;

    match value {
        Value::Object(record) => Ok(record),
        other => Err(PipelineError::manifest_with_code(
            ErrorCode::MANIFEST_NOT_AN_OBJECT,
            format!("Expected a JSON object, found {}", json_type_name(&other)),
            Some(path.to_path_buf()),
        )
        .with_line(line_number)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Writer producing a JSONL manifest through a `.partial` sibling file
pub struct ManifestWriter {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
    count: usize,
    published: bool,
}

impl ManifestWriter {
    /// Create the writer, creating parent directories as needed
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path.file_name().ok_or_else(|| {
            PipelineError::manifest_with_code(
                ErrorCode::MANIFEST_WRITE_FAILED,
                "Manifest path has no file name",
                Some(path.clone()),
            )
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.to_manifest_error(
                ErrorCode::MANIFEST_WRITE_FAILED,
                "Failed to create manifest directory",
                &path,
            )?;
        }

        let mut partial_name = file_name.to_os_string();
        partial_name.push(".partial");
        let partial = path.with_file_name(partial_name);

        let file = File::create(&partial).await.to_manifest_error(
            ErrorCode::MANIFEST_WRITE_FAILED,
            "Failed to create manifest",
            &path,
        )?;

        Ok(Self {
            path,
            partial,
            writer: Some(BufWriter::new(file)),
            count: 0,
            published: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Append one record as a compact JSON line
    pub async fn write(&mut self, record: &Record) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            PipelineError::manifest_with_code(
                ErrorCode::MANIFEST_WRITE_FAILED,
                "Manifest writer already finished",
                Some(self.path.clone()),
            )
        })?;

        let mut line = serde_json::to_vec(record).to_manifest_error(
            ErrorCode::MANIFEST_WRITE_FAILED,
            "Failed to serialize record",
            &self.path,
        )?;
        line.push(b'\n');

        writer.write_all(&line).await.to_manifest_error(
            ErrorCode::MANIFEST_WRITE_FAILED,
            "Failed to write manifest",
            &self.path,
        )?;
        self.count += 1;
        Ok(())
    }

    /// Flush and publish the manifest at its final path, returning the record count
    pub async fn finish(mut self) -> Result<usize> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await.to_manifest_error(
                ErrorCode::MANIFEST_WRITE_FAILED,
                "Failed to flush manifest",
                &self.path,
            )?;
            writer.into_inner().sync_all().await.to_manifest_error(
                ErrorCode::MANIFEST_WRITE_FAILED,
                "Failed to sync manifest",
                &self.path,
            )?;
        }

        tokio::fs::rename(&self.partial, &self.path)
            .await
            .to_manifest_error(
                ErrorCode::MANIFEST_WRITE_FAILED,
                "Failed to publish manifest",
                &self.path,
            )?;
        self.published = true;

        trace!("Wrote {} records to {}", self.count, self.path.display());
        Ok(self.count)
    }
}

impl Drop for ManifestWriter {
    fn drop(&mut self) {
        self.writer.take();
        if !self.published {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

/// Read every record of a manifest into memory
pub async fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let mut reader = ManifestReader::open(path).await?;
    let mut records = Vec::new();
    while let Some(record) = reader.next_record().await? {
        records.push(record);
    }
    Ok(records)
}

/// Read at most `n` records from the head of a manifest
pub async fn read_head(path: impl AsRef<Path>, n: usize) -> Result<Vec<Record>> {
    let mut reader = ManifestReader::open(path).await?;
    reader.next_chunk(n).await
}

/// Write a full manifest, returning the number of records written
pub async fn write_manifest<'a, I>(path: impl AsRef<Path>, records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = ManifestWriter::create(path).await?;
    for record in records {
        writer.write(record).await?;
    }
    writer.finish().await
}

/// Count records without loading the manifest into memory
pub async fn count_records(path: impl AsRef<Path>) -> Result<usize> {
    let mut reader = ManifestReader::open(path).await?;
    let mut count = 0;
    while reader.next_record().await?.is_some() {
        count += 1;
    }
    Ok(count)
}
