use crate::manifest::Record;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Free-form per-entry metrics, kept even when the record itself is dropped
pub type Metrics = Map<String, Value>;

/// One output slot produced by a transform
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Record written to the output manifest
    Kept { record: Record, metrics: Metrics },
    /// Record removed from the output; only its metrics survive
    Dropped { metrics: Metrics },
}

impl Entry {
    pub fn kept(record: Record) -> Self {
        Self::Kept {
            record,
            metrics: Metrics::new(),
        }
    }

    pub fn dropped() -> Self {
        Self::Dropped {
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        match self {
            Self::Kept { metrics, .. } | Self::Dropped { metrics } => metrics,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

/// Ordered result of transforming one input record.
///
/// No entries drops the record, one entry keeps or replaces it, more than one
/// expands it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformResult {
    entries: Vec<Entry>,
}

impl TransformResult {
    /// Drop the record without metrics
    pub fn drop_record() -> Self {
        Self::default()
    }

    /// Emit a single record
    pub fn keep(record: Record) -> Self {
        Self {
            entries: vec![Entry::kept(record)],
        }
    }

    /// Emit a single record with metrics attached
    pub fn keep_with_metrics(record: Record, metrics: Metrics) -> Self {
        Self {
            entries: vec![Entry::Kept { record, metrics }],
        }
    }

    /// Drop the record but keep its metrics
    pub fn dropped_with_metrics(metrics: Metrics) -> Self {
        Self {
            entries: vec![Entry::Dropped { metrics }],
        }
    }

    /// Emit every record, in order
    pub fn expand(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            entries: records.into_iter().map(Entry::kept).collect(),
        }
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Entry>> for TransformResult {
    fn from(entries: Vec<Entry>) -> Self {
        Self::from_entries(entries)
    }
}

/// Per-stage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub num_in: u64,
    pub num_out: u64,
    pub dropped: u64,
    pub expanded: u64,
    #[serde(with = "duration_secs")]
    pub wall_time: Duration,
    /// Sums of numeric entry metrics, accumulated in input order
    pub metrics: BTreeMap<String, f64>,
}

impl RunStats {
    /// Account for one transformed input record, moving kept records into `kept`.
    ///
    /// Both executors feed results through here in input order, which is what
    /// keeps their counters identical.
    pub(crate) fn absorb(&mut self, result: TransformResult, kept: &mut Vec<Record>) {
        self.num_in += 1;

        if result.entries.is_empty() {
            self.dropped += 1;
            return;
        }
        if result.entries.len() > 1 {
            self.expanded += 1;
        }

        for entry in result.entries {
            match entry {
                Entry::Kept { record, metrics } => {
                    self.add_metrics(&metrics);
                    self.num_out += 1;
                    kept.push(record);
                }
                Entry::Dropped { metrics } => {
                    self.add_metrics(&metrics);
                    self.dropped += 1;
                }
            }
        }
    }

    fn add_metrics(&mut self, metrics: &Metrics) {
        for (key, value) in metrics {
            if let Some(number) = value.as_f64() {
                *self.metrics.entry(key.clone()).or_insert(0.0) += number;
            }
        }
    }

    /// Counter tuple `(in, out, dropped, expanded)`, ignoring timing
    pub fn counts(&self) -> (u64, u64, u64, u64) {
        (self.num_in, self.num_out, self.dropped, self.expanded)
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunStats(in={}, out={}, dropped={}, expanded={}, time={:.2}s)",
            self.num_in,
            self.num_out,
            self.dropped,
            self.expanded,
            self.wall_time.as_secs_f64()
        )
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
