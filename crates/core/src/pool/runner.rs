//! Worker pool implementation.
//!
//! `max_workers` tasks share one dispatch channel. A batch is done when its
//! report channel closes, which happens once every work item (each holding a
//! report sender) has been handled and dropped.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::types::{JobHandler, PoolError, PoolStatus};
use crate::job::{JobBatch, JobReport, JobStatus};
use crate::metrics::{JOBS_IN_FLIGHT, JOB_PANICS};

struct WorkItem {
    job: crate::job::Job,
    done: mpsc::UnboundedSender<JobReport>,
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    processed: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed set of worker tasks fed through a closable channel.
pub struct WorkerPool {
    size: usize,
    dispatch: Mutex<Option<mpsc::Sender<WorkItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) on the current runtime.
    pub fn new(size: usize, handler: Arc<dyn JobHandler>) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<WorkItem>(size);
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&handler),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        info!(workers = size, "Worker pool started");
        Self {
            size,
            dispatch: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Hand every job of the batch to the workers and wait for all reports.
    ///
    /// Reports arrive in completion order, one per job.
    pub async fn run_batch(&self, batch: JobBatch) -> Result<Vec<JobReport>, PoolError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let sender = self
            .dispatch
            .lock()
            .await
            .clone()
            .ok_or(PoolError::ShutDown)?;

        let expected = batch.len();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        debug!(jobs = expected, "Dispatching batch");

        for job in batch {
            let item = WorkItem {
                job,
                done: done_tx.clone(),
            };
            if sender.send(item).await.is_err() {
                return Err(PoolError::ShutDown);
            }
        }
        drop(done_tx);
        drop(sender);

        let mut reports = Vec::with_capacity(expected);
        while let Some(report) = done_rx.recv().await {
            reports.push(report);
        }
        if reports.len() != expected {
            warn!(expected, received = reports.len(), "Batch finished short");
        }
        Ok(reports)
    }

    /// Stop accepting jobs, let workers drain the channel, and join them.
    pub async fn shutdown(&self) {
        let Some(sender) = self.dispatch.lock().await.take() else {
            debug!("Worker pool already shut down");
            return;
        };
        drop(sender);

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }

    pub async fn status(&self) -> PoolStatus {
        PoolStatus {
            workers: self.size,
            active: self.counters.active.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            accepting: self.dispatch.lock().await.is_some(),
        }
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    handler: Arc<dyn JobHandler>,
    counters: Arc<Counters>,
) {
    debug!(worker = id, "Worker started");
    loop {
        // Lock only for the dequeue so one worker owns each item.
        let next = queue.lock().await.recv().await;
        let Some(WorkItem { job, done }) = next else {
            break;
        };

        counters.active.fetch_add(1, Ordering::Relaxed);
        JOBS_IN_FLIGHT.inc();

        // Unknown how far a panicking handler got, so assume the change was
        // attempted.
        let mut fallback = JobReport::bare(
            &job,
            JobStatus::TransportError {
                change_attempted: true,
            },
        );
        let job_id = job.id;
        let task_handler = Arc::clone(&handler);
        let report = match tokio::spawn(async move { task_handler.handle(job).await }).await {
            Ok(report) => report,
            Err(e) => {
                if e.is_panic() {
                    error!(worker = id, %job_id, "Job handler panicked");
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    JOB_PANICS.inc();
                } else {
                    error!(worker = id, %job_id, "Job task cancelled: {}", e);
                }
                fallback.panicked = true;
                fallback
            }
        };

        JOBS_IN_FLIGHT.dec();
        counters.active.fetch_sub(1, Ordering::Relaxed);
        counters.processed.fetch_add(1, Ordering::Relaxed);

        if done.send(report).is_err() {
            warn!(worker = id, %job_id, "Batch receiver gone, dropping report");
        }
    }
    debug!(worker = id, "Worker exiting");
}
