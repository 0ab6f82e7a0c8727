//! Bounded pool of long-lived workers draining per-cycle job batches.

mod runner;
mod types;

pub use runner::WorkerPool;
pub use types::{JobHandler, PoolError, PoolStatus};
