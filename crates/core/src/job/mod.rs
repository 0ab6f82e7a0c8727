//! Change jobs: the unit of work handed from the orchestrator to the pool.

mod types;

pub use types::{
    format_timestamp, ChangeRecord, ChangeSummary, Job, JobBatch, JobReport, JobStatus,
    RecordError, RecordLocator, StatusUpdate,
};
