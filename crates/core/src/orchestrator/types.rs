//! Types for the orchestrator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobReport;
use crate::pool::{PoolError, PoolStatus};
use crate::records::RecordStoreError;

/// Errors that end a single poll cycle. The loop logs them and polls again.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Records could not be fetched.
    #[error("record store error: {0}")]
    Fetch(#[from] RecordStoreError),

    /// The pool refused the batch.
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// What one poll cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// Records returned by the store, blank rows included.
    pub fetched: usize,
    /// Pending records with missing fields, marked invalid.
    pub invalid: usize,
    /// Jobs handed to the pool.
    pub dispatched: usize,
    pub reports: Vec<JobReport>,
}

impl CycleOutcome {
    pub fn found_work(&self) -> bool {
        self.dispatched > 0
    }

    /// Poll again without sleeping. A batch that only produced retryable
    /// failures waits for the interval so unreachable devices are not
    /// hammered.
    pub fn should_repoll(&self) -> bool {
        self.found_work() && !self.reports.iter().all(|r| r.status.is_retryable())
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the poll loop is running.
    pub running: bool,
    /// Completed poll cycles, failed ones included.
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Jobs dispatched by the most recent cycle.
    pub last_batch_size: usize,
    /// Error of the most recent cycle, cleared by the next success.
    pub last_error: Option<String>,
    pub jobs_dispatched: u64,
    pub invalid_records: u64,
    /// Finished jobs by status label.
    pub outcomes: BTreeMap<String, u64>,
    pub pool: PoolStatus,
}
