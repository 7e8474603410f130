//! Chunked worker-pool executor
//!
//! Input is read in chunks of `chunk_size` records. Each record of a chunk is
//! sent as an `(ordinal, record)` task to a fixed pool of workers sharing one
//! task receiver. Workers run the transform on the blocking thread pool and
//! report `(ordinal, result)` back. The chunk is a barrier: once every result
//! has arrived, results are accounted and written in input order, so output
//! and counters match the sequential executor for a pure transform.

use super::map::MAX_WORKERS_LIMIT;
use super::sequential::{record_failure, transform_panicked};
use super::{RecordTransform, RunStats, TransformResult};
use crate::error::{ErrorCode, PipelineError, Result};
use crate::manifest::{ManifestReader, ManifestWriter, Record};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Task {
    ordinal: u64,
    record: Record,
}

struct Outcome {
    ordinal: u64,
    result: Result<TransformResult>,
}

/// Apply `transform` with `workers` concurrent workers
pub async fn run<T: RecordTransform>(
    transform: Arc<T>,
    mut reader: ManifestReader,
    mut writer: ManifestWriter,
    workers: usize,
    chunk_size: usize,
) -> Result<RunStats> {
    let chunk_size = chunk_size.max(1);
    // A chunk never holds more than `chunk_size` tasks, so extra workers would idle
    let workers = workers.clamp(1, chunk_size.min(MAX_WORKERS_LIMIT));

    let (task_tx, task_rx) = mpsc::channel::<Task>(workers * 2);
    let task_rx = Arc::new(Mutex::new(task_rx));
    // Unbounded so a worker never blocks on reporting while the dispatcher
    // is still filling the task queue.
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<Outcome>();

    let pool: Vec<JoinHandle<()>> = (0..workers)
        .map(|worker_id| {
            spawn_worker(
                worker_id,
                transform.clone(),
                task_rx.clone(),
                result_tx.clone(),
            )
        })
        .collect();
    drop(result_tx);

    let mut stats = RunStats::default();
    let outcome = async {
        let mut kept = Vec::new();
        let mut dispatched: u64 = 0;

        loop {
            let chunk = reader.next_chunk(chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            let base = dispatched;
            let len = chunk.len();
            debug!(first = base + 1, len, "Dispatching chunk");

            for (offset, record) in chunk.into_iter().enumerate() {
                let ordinal = base + offset as u64 + 1;
                task_tx
                    .send(Task { ordinal, record })
                    .await
                    .map_err(|_| pool_closed())?;
            }
            dispatched += len as u64;

            let mut slots: Vec<Option<TransformResult>> = (0..len).map(|_| None).collect();
            for _ in 0..len {
                let Outcome { ordinal, result } = result_rx.recv().await.ok_or_else(pool_closed)?;
                let result = result.map_err(|e| record_failure(ordinal, e))?;
                slots[(ordinal - base - 1) as usize] = Some(result);
            }

            for slot in slots {
                let result = slot.ok_or_else(pool_closed)?;
                stats.absorb(result, &mut kept);
                for record in kept.drain(..) {
                    writer.write(&record).await?;
                }
            }
            trace!(completed = dispatched, "Chunk written");
        }

        Ok::<(), PipelineError>(())
    }
    .await;

    drop(task_tx);
    match outcome {
        Ok(()) => {
            for handle in pool {
                handle.await.map_err(|e| {
                    PipelineError::processor_with_code(
                        ErrorCode::PROCESSOR_WORKER_FAILED,
                        "Worker task failed to shut down",
                    )
                    .with_source(e)
                })?;
            }
        }
        Err(err) => {
            for handle in &pool {
                handle.abort();
            }
            return Err(err);
        }
    }

    writer.finish().await?;
    Ok(stats)
}

fn spawn_worker<T: RecordTransform>(
    worker_id: usize,
    transform: Arc<T>,
    tasks: Arc<Mutex<mpsc::Receiver<Task>>>,
    results: mpsc::UnboundedSender<Outcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let task = { tasks.lock().await.recv().await };
            let Some(Task { ordinal, record }) = task else {
                break;
            };

            let transform = transform.clone();
            let result = match tokio::task::spawn_blocking(move || transform.transform(record)).await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => {
                    Err(transform_panicked(join_err.into_panic().as_ref()))
                }
                Err(join_err) => Err(PipelineError::processor_with_code(
                    ErrorCode::PROCESSOR_WORKER_FAILED,
                    format!("Worker {} lost its transform task", worker_id),
                )
                .with_source(join_err)),
            };

            if results.send(Outcome { ordinal, result }).is_err() {
                break;
            }
        }
        trace!(worker_id, "Worker exiting");
    })
}

fn pool_closed() -> PipelineError {
    PipelineError::processor_with_code(
        ErrorCode::PROCESSOR_WORKER_FAILED,
        "Worker pool terminated before the chunk completed",
    )
}
