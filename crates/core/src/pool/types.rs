//! Types for the worker pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{Job, JobReport};

/// Errors from the worker pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// `shutdown` has been called; no more jobs are accepted.
    #[error("worker pool is shut down")]
    ShutDown,
}

/// Processes one job to completion.
///
/// Implementations must not fail: every outcome is expressed in the report.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job) -> JobReport;
}

/// Snapshot of the pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolStatus {
    /// Long-lived worker tasks.
    pub workers: usize,
    /// Jobs currently being handled.
    pub active: usize,
    /// Jobs handled since start, including panicked ones.
    pub processed: u64,
    pub panicked: u64,
    /// False once `shutdown` has been called.
    pub accepting: bool,
}
