//! Poll loop: fetch records, batch the pending ones, run the batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::VlanCatalog;
use crate::job::{
    ChangeSummary, Job, JobBatch, JobReport, JobStatus, RecordLocator, StatusUpdate,
};
use crate::metrics::{BATCH_SIZE, POLL_CYCLES};
use crate::pool::WorkerPool;
use crate::records::RecordStore;

use super::config::OrchestratorConfig;
use super::types::{CycleOutcome, OrchestratorError, OrchestratorStatus};

/// Everything a cycle needs, shared with the spawned loop.
struct CycleContext {
    records: Arc<dyn RecordStore>,
    pool: Arc<WorkerPool>,
    catalog: Arc<VlanCatalog>,
    management_port: u16,
    timezone: Tz,
    stats: RwLock<OrchestratorStatus>,
}

/// Drives pending records through the worker pool until stopped.
pub struct Orchestrator {
    config: OrchestratorConfig,
    ctx: Arc<CycleContext>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Create a new orchestrator. `management_port` is the device port every
    /// job connects to.
    pub fn new(
        config: OrchestratorConfig,
        records: Arc<dyn RecordStore>,
        pool: Arc<WorkerPool>,
        catalog: Arc<VlanCatalog>,
        management_port: u16,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            ctx: Arc::new(CycleContext {
                records,
                pool,
                catalog,
                management_port,
                timezone: Tz::UTC,
                stats: RwLock::new(OrchestratorStatus::default()),
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    /// Zone for the statuses the orchestrator writes itself. Call before
    /// `start`.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        match Arc::get_mut(&mut self.ctx) {
            Some(ctx) => ctx.timezone = timezone,
            None => warn!("Orchestrator already started; timezone unchanged"),
        }
        self
    }

    /// Start the poll loop (spawns a background task).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            workers = self.ctx.pool.size(),
            "Starting orchestrator"
        );
        let handle = self.spawn_poll_loop();
        *self.loop_handle.lock().await = Some(handle);
    }

    /// Stop the poll loop. A batch in flight runs to completion first.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping orchestrator");
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.loop_handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Poll loop ended abnormally: {}", e);
            }
        }
        info!("Orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let mut status = self.ctx.stats.read().await.clone();
        status.running = self.is_running();
        status.pool = self.ctx.pool.status().await;
        status
    }

    /// Run one poll cycle now, independent of the loop.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, OrchestratorError> {
        run_cycle(&self.ctx).await
    }

    fn spawn_poll_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let ctx = Arc::clone(&self.ctx);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Poll loop started");
            while running.load(Ordering::Relaxed) {
                let repoll = match run_cycle(&ctx).await {
                    Ok(outcome) => outcome.should_repoll(),
                    Err(e) => {
                        warn!("Poll cycle failed: {}", e);
                        false
                    }
                };

                if repoll {
                    // Pick up anything submitted while the batch ran, unless
                    // a stop arrived meanwhile.
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    continue;
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Poll loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Poll loop stopped");
        })
    }
}

async fn run_cycle(ctx: &CycleContext) -> Result<CycleOutcome, OrchestratorError> {
    let result = poll_and_dispatch(ctx).await;

    let mut stats = ctx.stats.write().await;
    stats.cycles += 1;
    stats.last_cycle_at = Some(Utc::now());
    match &result {
        Ok(outcome) => {
            let label = if outcome.found_work() { "work" } else { "idle" };
            POLL_CYCLES.with_label_values(&[label]).inc();
            stats.last_error = None;
            stats.last_batch_size = outcome.dispatched;
            stats.jobs_dispatched += outcome.dispatched as u64;
            stats.invalid_records += outcome.invalid as u64;
            for report in &outcome.reports {
                *stats
                    .outcomes
                    .entry(report.status.label().to_string())
                    .or_default() += 1;
            }
        }
        Err(e) => {
            POLL_CYCLES.with_label_values(&["error"]).inc();
            stats.last_error = Some(e.to_string());
            stats.last_batch_size = 0;
        }
    }
    result
}

async fn poll_and_dispatch(ctx: &CycleContext) -> Result<CycleOutcome, OrchestratorError> {
    let records = ctx.records.fetch_all().await?;
    let mut outcome = CycleOutcome {
        fetched: records.len(),
        ..Default::default()
    };

    let mut batch = JobBatch::new();
    let mut groups: HashMap<RecordLocator, String> = HashMap::new();
    for record in records.iter().filter(|r| !r.is_blank() && r.is_pending()) {
        match Job::from_record(record, ctx.management_port) {
            Ok(job) => {
                let locator = job.locator;
                let group = job.desired_group.clone();
                if batch.push(job) {
                    groups.insert(locator, group);
                } else {
                    debug!(%locator, "Duplicate locator in poll, skipping");
                }
            }
            Err(e) => {
                warn!("Rejecting record: {}", e);
                outcome.invalid += 1;
                let group = record.desired_group.clone().unwrap_or_else(|| "-".to_string());
                write_terminal(ctx, &record.locator, JobStatus::InvalidRequest, group).await;
            }
        }
    }

    outcome.dispatched = batch.len();
    if batch.is_empty() {
        debug!(fetched = outcome.fetched, "No pending records");
        return Ok(outcome);
    }

    info!(jobs = outcome.dispatched, "Dispatching pending records");
    BATCH_SIZE.observe(outcome.dispatched as f64);
    outcome.reports = ctx.pool.run_batch(batch).await?;

    // A panicking job never wrote its terminal status.
    for report in outcome.reports.iter().filter(|r| r.panicked) {
        let group = groups.remove(&report.locator).unwrap_or_default();
        write_terminal(ctx, &report.locator, report.status, group).await;
    }

    log_batch(&outcome.reports);
    Ok(outcome)
}

async fn write_terminal(ctx: &CycleContext, locator: &RecordLocator, status: JobStatus, group: String) {
    let summary = ChangeSummary {
        before: None,
        desired_id: ctx.catalog.lookup(&group),
        desired_group: group,
    };
    let update = StatusUpdate::now(status, &summary, ctx.timezone);
    if let Err(e) = ctx.records.write_status(locator, &update).await {
        warn!(%locator, "Failed to record {}: {}", status, e);
    }
}

fn log_batch(reports: &[JobReport]) {
    let succeeded = reports.iter().filter(|r| r.status.is_success()).count();
    let retryable = reports.iter().filter(|r| r.status.is_retryable()).count();
    info!(
        total = reports.len(),
        succeeded,
        retryable,
        failed = reports.len() - succeeded - retryable,
        "Batch complete"
    );
}
