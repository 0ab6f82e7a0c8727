//! Orchestrator loop for automated request processing.
//!
//! Each cycle reads every record, turns the pending ones into a per-cycle
//! batch (one job per record) and runs it on the worker pool:
//! - **Work found**: poll again immediately after the batch completes
//! - **Idle**: sleep for the poll interval
//! - **Fetch error**: logged, retried on the next cycle

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::Orchestrator;
pub use types::{CycleOutcome, OrchestratorError, OrchestratorStatus};
