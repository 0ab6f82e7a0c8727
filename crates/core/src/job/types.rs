//! Change requests, their lifecycle and what gets written back.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::device::DeviceTarget;
use crate::notifier::is_plain_address;
use crate::parser::PortVlanFact;

/// Errors turning a record into a job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{locator} is missing {field}")]
    MissingField {
        locator: RecordLocator,
        field: &'static str,
    },

    #[error("{locator} has an invalid {field}: {value:?}")]
    InvalidField {
        locator: RecordLocator,
        field: &'static str,
        value: String,
    },
}

/// Opaque handle back to the external record (a sheet row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordLocator {
    pub row: u32,
}

impl RecordLocator {
    pub fn row(row: u32) -> Self {
        Self { row }
    }
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.row)
    }
}

/// One submitted request as read from the record store.
///
/// Blank cells are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub locator: RecordLocator,
    pub desired_group: Option<String>,
    pub device_address: Option<String>,
    pub interface_spec: Option<String>,
    pub notify_address: Option<String>,
    pub status: Option<String>,
}

impl ChangeRecord {
    /// A record with only a locator.
    pub fn empty(locator: RecordLocator) -> Self {
        Self {
            locator,
            desired_group: None,
            device_address: None,
            interface_spec: None,
            notify_address: None,
            status: None,
        }
    }

    /// No cell carries a value.
    pub fn is_blank(&self) -> bool {
        self.desired_group.is_none()
            && self.device_address.is_none()
            && self.interface_spec.is_none()
            && self.notify_address.is_none()
            && self.status.is_none()
    }

    /// Needs processing: never attempted, or last attempt was retryable.
    pub fn is_pending(&self) -> bool {
        match self.status.as_deref() {
            None => true,
            Some(label) => JobStatus::from_label(label).is_some_and(|s| s.is_retryable()),
        }
    }
}

/// Lifecycle of one change attempt.
///
/// Non-terminal states advance strictly forward; once terminal, a status
/// never changes within the same execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Connecting,
    Probing,
    Applying,
    Verifying,
    Succeeded,
    Failed,
    PortNotFound,
    PortIsTrunk,
    AuthFailure,
    ConnTimeout,
    UnknownVlan,
    InvalidRequest,
    TransportError { change_attempted: bool },
}

impl JobStatus {
    /// Text written to the record's status cell.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Connecting => "Connecting...",
            JobStatus::Probing => "Connection Established",
            JobStatus::Applying => "Attempting change...",
            JobStatus::Verifying => "Verifying change...",
            JobStatus::Succeeded => "Successful",
            JobStatus::Failed => "Failed",
            JobStatus::PortNotFound => "Port not found",
            JobStatus::PortIsTrunk => "Port is trunk",
            JobStatus::AuthFailure => "Authentication Failure",
            JobStatus::ConnTimeout => "Connection Timeout",
            JobStatus::UnknownVlan => "Unknown VLAN",
            JobStatus::InvalidRequest => "Invalid request",
            JobStatus::TransportError {
                change_attempted: false,
            } => "Connection lost before change",
            JobStatus::TransportError {
                change_attempted: true,
            } => "Connection lost during change",
        }
    }

    /// Parse a status cell. Unrecognized text yields `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let status = match label.trim() {
            "Queued" => JobStatus::Queued,
            "Connecting..." => JobStatus::Connecting,
            "Connection Established" => JobStatus::Probing,
            "Attempting change..." => JobStatus::Applying,
            "Verifying change..." => JobStatus::Verifying,
            "Successful" => JobStatus::Succeeded,
            "Failed" => JobStatus::Failed,
            "Port not found" => JobStatus::PortNotFound,
            "Port is trunk" => JobStatus::PortIsTrunk,
            "Authentication Failure" => JobStatus::AuthFailure,
            "Connection Timeout" => JobStatus::ConnTimeout,
            "Unknown VLAN" => JobStatus::UnknownVlan,
            "Invalid request" => JobStatus::InvalidRequest,
            "Connection lost before change" => JobStatus::TransportError {
                change_attempted: false,
            },
            "Connection lost during change" => JobStatus::TransportError {
                change_attempted: true,
            },
            _ => return None,
        };
        Some(status)
    }

    /// Label used for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Connecting => "connecting",
            JobStatus::Probing => "probing",
            JobStatus::Applying => "applying",
            JobStatus::Verifying => "verifying",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::PortNotFound => "port_not_found",
            JobStatus::PortIsTrunk => "port_is_trunk",
            JobStatus::AuthFailure => "auth_failure",
            JobStatus::ConnTimeout => "conn_timeout",
            JobStatus::UnknownVlan => "unknown_vlan",
            JobStatus::InvalidRequest => "invalid_request",
            JobStatus::TransportError { .. } => "transport_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == TERMINAL_RANK
    }

    /// A later poll picks the record up again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobStatus::AuthFailure | JobStatus::ConnTimeout)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Connecting => 1,
            JobStatus::Probing => 2,
            JobStatus::Applying => 3,
            JobStatus::Verifying => 4,
            _ => TERMINAL_RANK,
        }
    }

    /// Whether moving from `self` to `next` goes forward.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

const TERMINAL_RANK: u8 = 5;

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A change request ready to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub target: DeviceTarget,
    /// Interface as submitted, before canonicalization.
    pub interface_spec: String,
    /// VLAN name, resolved through the catalog.
    pub desired_group: String,
    pub notify_address: Option<String>,
    pub locator: RecordLocator,
    /// Status cell seen at poll time.
    pub previous_status: Option<String>,
    pub attempt_status: JobStatus,
}

impl Job {
    /// Build a job from a pending record. Device address, interface and
    /// VLAN name are required; a notify address, when present, must be a
    /// single bare mailbox since it ends up in a mail header.
    pub fn from_record(record: &ChangeRecord, management_port: u16) -> Result<Self, RecordError> {
        let require = |value: &Option<String>, field: &'static str| {
            value.clone().ok_or(RecordError::MissingField {
                locator: record.locator,
                field,
            })
        };

        if let Some(address) = &record.notify_address {
            if !is_plain_address(address) {
                return Err(RecordError::InvalidField {
                    locator: record.locator,
                    field: "notify address",
                    value: address.clone(),
                });
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            target: DeviceTarget::new(require(&record.device_address, "device address")?, management_port),
            interface_spec: require(&record.interface_spec, "interface")?,
            desired_group: require(&record.desired_group, "VLAN name")?,
            notify_address: record.notify_address.clone(),
            locator: record.locator,
            previous_status: record.status.clone(),
            attempt_status: JobStatus::Queued,
        })
    }

    /// Move to `next` if that is a forward transition. Returns whether the
    /// status changed.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.attempt_status.can_advance_to(next) {
            self.attempt_status = next;
            true
        } else {
            false
        }
    }
}

/// Before → after description written next to the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSummary {
    /// `None` until the port has been probed.
    pub before: Option<PortVlanFact>,
    pub desired_group: String,
    pub desired_id: Option<u16>,
}

/// `"DATA, 8 >> Printers, 5"`; `-` stands in for an unprobed port and `None`
/// for a VLAN missing from the catalog.
impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.before {
            Some(fact) => write!(f, "{}", fact)?,
            None => f.write_str("-")?,
        }
        write!(f, " >> {}, ", self.desired_group)?;
        match self.desired_id {
            Some(id) => write!(f, "{}", id),
            None => f.write_str("None"),
        }
    }
}

/// One write to a record: status, timestamp and change summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub timestamp: String,
    pub summary: String,
}

impl StatusUpdate {
    /// Stamped with the current time as seen in `zone`.
    pub fn now(status: JobStatus, summary: &ChangeSummary, zone: Tz) -> Self {
        Self::at(status, summary, Utc::now(), zone)
    }

    pub fn at(status: JobStatus, summary: &ChangeSummary, instant: DateTime<Utc>, zone: Tz) -> Self {
        Self {
            status: status.label().to_string(),
            timestamp: format_timestamp(instant.with_timezone(&zone).naive_local()),
            summary: summary.to_string(),
        }
    }
}

/// `M/D/YYYY HH:MM:SS` without leading zeros on month and day.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format("%-m/%-d/%Y %H:%M:%S").to_string()
}

/// Outcome of one executed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub locator: RecordLocator,
    pub target: DeviceTarget,
    pub status: JobStatus,
    pub before: Option<PortVlanFact>,
    pub after: Option<PortVlanFact>,
    pub duration_ms: u64,
    /// The handler panicked; the record was not given a terminal status.
    #[serde(default)]
    pub panicked: bool,
}

impl JobReport {
    /// Report for a job that ended without touching the device.
    pub fn bare(job: &Job, status: JobStatus) -> Self {
        Self {
            job_id: job.id,
            locator: job.locator,
            target: job.target.clone(),
            status,
            before: None,
            after: None,
            duration_ms: 0,
            panicked: false,
        }
    }
}

/// The jobs of one poll cycle, at most one per locator.
#[derive(Debug, Default)]
pub struct JobBatch {
    jobs: Vec<Job>,
}

impl JobBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job unless its locator is already present. Returns whether it
    /// was added.
    pub fn push(&mut self, job: Job) -> bool {
        if self.jobs.iter().any(|j| j.locator == job.locator) {
            return false;
        }
        self.jobs.push(job);
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl IntoIterator for JobBatch {
    type Item = Job;
    type IntoIter = std::vec::IntoIter<Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl FromIterator<Job> for JobBatch {
    fn from_iter<I: IntoIterator<Item = Job>>(iter: I) -> Self {
        let mut batch = JobBatch::new();
        for job in iter {
            batch.push(job);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ALL_STATUSES: [JobStatus; 15] = [
        JobStatus::Queued,
        JobStatus::Connecting,
        JobStatus::Probing,
        JobStatus::Applying,
        JobStatus::Verifying,
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::PortNotFound,
        JobStatus::PortIsTrunk,
        JobStatus::AuthFailure,
        JobStatus::ConnTimeout,
        JobStatus::UnknownVlan,
        JobStatus::InvalidRequest,
        JobStatus::TransportError {
            change_attempted: false,
        },
        JobStatus::TransportError {
            change_attempted: true,
        },
    ];

    fn record(row: u32) -> ChangeRecord {
        ChangeRecord {
            locator: RecordLocator::row(row),
            desired_group: Some("DATA".to_string()),
            device_address: Some("10.0.0.1".to_string()),
            interface_spec: Some("Gi0/13".to_string()),
            notify_address: Some("user@example.com".to_string()),
            status: None,
        }
    }

    #[test]
    fn test_labels_parse_back() {
        for status in ALL_STATUSES {
            assert_eq!(JobStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(JobStatus::from_label("Exploded"), None);
    }

    #[test]
    fn test_only_auth_and_timeout_are_retryable() {
        let retryable: Vec<_> = ALL_STATUSES.iter().filter(|s| s.is_retryable()).collect();
        assert_eq!(
            retryable,
            vec![&JobStatus::AuthFailure, &JobStatus::ConnTimeout]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Verifying.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::TransportError {
            change_attempted: true
        }
        .is_terminal());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut job = Job::from_record(&record(2), 22).unwrap();
        assert!(job.advance(JobStatus::Connecting));
        assert!(job.advance(JobStatus::Probing));
        assert!(!job.advance(JobStatus::Connecting));
        assert!(job.advance(JobStatus::PortNotFound));
        assert!(!job.advance(JobStatus::Succeeded));
        assert_eq!(job.attempt_status, JobStatus::PortNotFound);
    }

    #[test]
    fn test_pending_classification() {
        let mut rec = record(2);
        assert!(rec.is_pending());

        rec.status = Some("Authentication Failure".to_string());
        assert!(rec.is_pending());
        rec.status = Some("Connection Timeout".to_string());
        assert!(rec.is_pending());

        rec.status = Some("Successful".to_string());
        assert!(!rec.is_pending());
        rec.status = Some("Connecting...".to_string());
        assert!(!rec.is_pending());
        rec.status = Some("something a human typed".to_string());
        assert!(!rec.is_pending());
    }

    #[test]
    fn test_blank_record() {
        assert!(ChangeRecord::empty(RecordLocator::row(7)).is_blank());
        assert!(!record(7).is_blank());
    }

    #[test]
    fn test_from_record_requires_fields() {
        let mut rec = record(4);
        rec.interface_spec = None;
        assert_eq!(
            Job::from_record(&rec, 22),
            Err(RecordError::MissingField {
                locator: RecordLocator::row(4),
                field: "interface"
            })
        );

        let job = Job::from_record(&record(4), 2222).unwrap();
        assert_eq!(job.target, DeviceTarget::new("10.0.0.1", 2222));
        assert_eq!(job.attempt_status, JobStatus::Queued);
        assert_eq!(job.previous_status, None);
    }

    #[test]
    fn test_change_summary_rendering() {
        let summary = ChangeSummary {
            before: Some(PortVlanFact::assigned("DATA", 8)),
            desired_group: "Printers".to_string(),
            desired_id: Some(5),
        };
        assert_eq!(summary.to_string(), "DATA, 8 >> Printers, 5");

        let unprobed = ChangeSummary {
            before: None,
            desired_group: "Lobby".to_string(),
            desired_id: None,
        };
        assert_eq!(unprobed.to_string(), "- >> Lobby, None");

        let unknown = ChangeSummary {
            before: Some(PortVlanFact::Unknown),
            desired_group: "DATA".to_string(),
            desired_id: Some(8),
        };
        assert_eq!(unknown.to_string(), "None, -1 >> DATA, 8");
    }

    #[test]
    fn test_timestamp_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(format_timestamp(at), "3/7/2024 09:05:03");
    }

    #[test]
    fn test_batch_dedupes_locators() {
        let mut batch = JobBatch::new();
        assert!(batch.push(Job::from_record(&record(2), 22).unwrap()));
        assert!(!batch.push(Job::from_record(&record(2), 22).unwrap()));
        assert!(batch.push(Job::from_record(&record(3), 22).unwrap()));
        assert_eq!(batch.len(), 2);
        let rows: Vec<u32> = batch.into_iter().map(|j| j.locator.row).collect();
        assert_eq!(rows, vec![2, 3]);
    }

    #[test]
    fn test_from_record_rejects_header_breaking_notify_address() {
        let mut rec = record(5);
        rec.notify_address = Some("requester@example.org\r\nBcc: someone@elsewhere.test".to_string());
        assert!(matches!(
            Job::from_record(&rec, 22),
            Err(RecordError::InvalidField {
                field: "notify address",
                ..
            })
        ));

        rec.notify_address = Some("a@example.org, b@example.org".to_string());
        assert!(Job::from_record(&rec, 22).is_err());

        rec.notify_address = None;
        assert!(Job::from_record(&rec, 22).is_ok());
    }

    #[test]
    fn test_status_update_stamped_in_zone() {
        let summary = ChangeSummary {
            before: Some(PortVlanFact::assigned("DATA", 8)),
            desired_group: "Printers".to_string(),
            desired_id: Some(12),
        };
        let instant = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(15, 5, 3)
            .unwrap()
            .and_utc();

        let chicago = StatusUpdate::at(JobStatus::Succeeded, &summary, instant, chrono_tz::America::Chicago);
        assert_eq!(chicago.timestamp, "3/7/2024 09:05:03");
        assert_eq!(chicago.status, "Successful");
        assert_eq!(chicago.summary, "DATA, 8 >> Printers, 12");

        let utc = StatusUpdate::at(JobStatus::Succeeded, &summary, instant, Tz::UTC);
        assert_eq!(utc.timestamp, "3/7/2024 15:05:03");
    }
}
