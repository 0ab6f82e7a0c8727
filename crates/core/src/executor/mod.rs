//! Change execution: one job, one device session, one terminal status.

mod runner;
mod types;

pub use runner::{notification_body, ChangeExecutor, SUBJECT_CHANGED, SUBJECT_FAILED};
pub use types::ChangeError;
