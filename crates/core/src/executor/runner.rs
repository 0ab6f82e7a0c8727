//! Drives one job through connect → probe → apply → verify.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::{debug, info, info_span, warn, Instrument};

use super::types::ChangeError;
use crate::catalog::VlanCatalog;
use crate::device::{DeviceConnector, DeviceDriver, DeviceSession, DriverRegistry, PortProbe};
use crate::job::{ChangeSummary, Job, JobReport, JobStatus, StatusUpdate};
use crate::metrics::{JOBS_COMPLETED, JOB_DURATION, NOTIFICATIONS};
use crate::notifier::Notifier;
use crate::parser::PortVlanFact;
use crate::pool::JobHandler;
use crate::records::RecordStore;

pub const SUBJECT_CHANGED: &str = "VLAN Changed";
pub const SUBJECT_FAILED: &str = "VLAN change fail";

/// What the attempt learned about the port so far.
#[derive(Debug, Default)]
struct Observed {
    before: Option<PortVlanFact>,
    after: Option<PortVlanFact>,
}

/// Executes change jobs against devices.
///
/// Shared by every worker. Each `execute` call owns its job and opens at
/// most one session, which is closed before the final status is written.
pub struct ChangeExecutor {
    connector: Arc<dyn DeviceConnector>,
    drivers: Arc<DriverRegistry>,
    catalog: Arc<VlanCatalog>,
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    operators: Vec<String>,
    timezone: Tz,
}

impl ChangeExecutor {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        drivers: Arc<DriverRegistry>,
        catalog: Arc<VlanCatalog>,
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        operators: Vec<String>,
    ) -> Self {
        Self {
            connector,
            drivers,
            catalog,
            records,
            notifier,
            operators,
            timezone: Tz::UTC,
        }
    }

    /// Zone for status timestamps (UTC unless set).
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Run one job to a terminal status. Never fails; every problem ends up
    /// in the returned report and in the record.
    pub async fn execute(&self, mut job: Job) -> JobReport {
        let started = Instant::now();
        let span = info_span!(
            "job",
            job_id = %job.id,
            device = %job.target,
            interface = %job.interface_spec,
            vlan = %job.desired_group,
        );

        async move {
            if let Some(previous) = &job.previous_status {
                info!(previous = %previous, "Retrying request");
            }

            let desired_id = self.catalog.lookup(&job.desired_group);
            let mut observed = Observed::default();
            let outcome = self.attempt(&mut job, desired_id, &mut observed).await;

            let status = match &outcome {
                Ok(()) => JobStatus::Succeeded,
                Err(e) => e.status(),
            };
            if !job.advance(status) {
                warn!(from = %job.attempt_status, to = %status, "Unexpected status transition");
            }

            let summary = ChangeSummary {
                before: observed.before.clone(),
                desired_group: job.desired_group.clone(),
                desired_id,
            };
            self.write_status(&job, status, &summary).await;

            match &outcome {
                Ok(()) => info!(%summary, "VLAN changed"),
                Err(e) => warn!(status = %status, "Change not applied: {}", e),
            }
            self.notify_outcome(&job, status, &summary).await;

            let elapsed = started.elapsed();
            JOBS_COMPLETED
                .with_label_values(&[status.metric_label()])
                .inc();
            JOB_DURATION
                .with_label_values(&[status.metric_label()])
                .observe(elapsed.as_secs_f64());

            JobReport {
                job_id: job.id,
                locator: job.locator,
                target: job.target.clone(),
                status,
                before: observed.before,
                after: observed.after,
                duration_ms: elapsed.as_millis() as u64,
                panicked: false,
            }
        }
        .instrument(span)
        .await
    }

    /// Everything up to, but not including, the terminal status write.
    async fn attempt(
        &self,
        job: &mut Job,
        desired_id: Option<u16>,
        observed: &mut Observed,
    ) -> Result<(), ChangeError> {
        let driver = self.drivers.resolve(&job.target.address)?;
        let interface = driver.normalize_interface(&job.interface_spec)?;
        let desired_id =
            desired_id.ok_or_else(|| ChangeError::UnknownVlanName(job.desired_group.clone()))?;

        self.progress(job, JobStatus::Connecting, observed, desired_id)
            .await;
        let mut session = self
            .connector
            .open(&job.target, driver.dialect())
            .await
            .map_err(ChangeError::Connect)?;
        self.progress(job, JobStatus::Probing, observed, desired_id)
            .await;

        let result = self
            .on_session(job, driver.as_ref(), session.as_mut(), &interface, desired_id, observed)
            .await;

        if let Err(e) = session.close().await {
            warn!("Session close failed: {}", e);
        }
        result
    }

    async fn on_session(
        &self,
        job: &mut Job,
        driver: &dyn DeviceDriver,
        session: &mut dyn DeviceSession,
        interface: &str,
        desired_id: u16,
        observed: &mut Observed,
    ) -> Result<(), ChangeError> {
        let probe = driver
            .probe(session, interface)
            .await
            .map_err(|e| ChangeError::from_session(e, false))?;

        let before = match probe {
            PortProbe::Access(fact) => fact,
            PortProbe::Trunk => {
                observed.before = Some(PortVlanFact::Unknown);
                return Err(ChangeError::PortIsTrunk(interface.to_string()));
            }
            PortProbe::NotFound => {
                observed.before = Some(PortVlanFact::Unknown);
                return Err(ChangeError::PortNotFound(interface.to_string()));
            }
        };
        debug!(before = %before, "Port probed");
        observed.before = Some(before);

        self.progress(job, JobStatus::Applying, observed, desired_id)
            .await;
        driver
            .apply_change(session, interface, desired_id)
            .await
            .map_err(|e| ChangeError::from_session(e, true))?;

        self.progress(job, JobStatus::Verifying, observed, desired_id)
            .await;
        let after = driver
            .verify(session, interface)
            .await
            .map_err(|e| ChangeError::from_session(e, true))?;
        observed.after = Some(after.clone());

        if after.id() != Some(desired_id) {
            return Err(ChangeError::VerificationFailed {
                expected: desired_id,
                actual: after,
            });
        }

        session
            .persist()
            .await
            .map_err(|e| ChangeError::from_session(e, true))?;
        Ok(())
    }

    /// Advance to a non-terminal status and write it to the record.
    async fn progress(
        &self,
        job: &mut Job,
        status: JobStatus,
        observed: &Observed,
        desired_id: u16,
    ) {
        if !job.advance(status) {
            warn!(from = %job.attempt_status, to = %status, "Unexpected status transition");
            return;
        }
        let summary = ChangeSummary {
            before: observed.before.clone(),
            desired_group: job.desired_group.clone(),
            desired_id: Some(desired_id),
        };
        self.write_status(job, status, &summary).await;
    }

    async fn write_status(&self, job: &Job, status: JobStatus, summary: &ChangeSummary) {
        let update = StatusUpdate::now(status, summary, self.timezone);
        if let Err(e) = self.records.write_status(&job.locator, &update).await {
            warn!(
                locator = %job.locator,
                status = %status,
                "Failed to record status in {}: {}",
                self.records.name(),
                e
            );
        }
    }

    async fn notify_outcome(&self, job: &Job, status: JobStatus, summary: &ChangeSummary) {
        let (audience, recipients, subject) = if status.is_success() {
            let requester: Vec<String> = job.notify_address.iter().cloned().collect();
            ("requester", requester, SUBJECT_CHANGED)
        } else {
            ("operators", self.operators.clone(), SUBJECT_FAILED)
        };

        if recipients.is_empty() {
            debug!(audience, "No recipients, skipping notification");
            return;
        }

        let body = notification_body(job, status, summary);
        let result = self.notifier.notify(&recipients, subject, &body).await;
        NOTIFICATIONS
            .with_label_values(&[audience, if result.is_ok() { "sent" } else { "failed" }])
            .inc();
        if let Err(e) = result {
            warn!(audience, "Notification via {} failed: {}", self.notifier.name(), e);
        }
    }
}

/// Plain-text body: the request as submitted, then the outcome.
pub fn notification_body(job: &Job, status: JobStatus, summary: &ChangeSummary) -> String {
    format!(
        "Record: {}\n\
         Device: {}\n\
         Interface: {}\n\
         Requested VLAN: {}\n\
         Requested by: {}\n\
         \n\
         Status: {}\n\
         Change: {}\n",
        job.locator,
        job.target.address,
        job.interface_spec,
        job.desired_group,
        job.notify_address.as_deref().unwrap_or("-"),
        status,
        summary,
    )
}

#[async_trait]
impl JobHandler for ChangeExecutor {
    async fn handle(&self, job: Job) -> JobReport {
        self.execute(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ChangeRecord, RecordLocator};

    #[test]
    fn test_notification_body() {
        let record = ChangeRecord {
            locator: RecordLocator::row(12),
            desired_group: Some("Printers".to_string()),
            device_address: Some("10.0.0.1".to_string()),
            interface_spec: Some("GigabitEthernet0/13".to_string()),
            notify_address: None,
            status: None,
        };
        let job = Job::from_record(&record, 22).unwrap();
        let summary = ChangeSummary {
            before: Some(PortVlanFact::assigned("DATA", 8)),
            desired_group: "Printers".to_string(),
            desired_id: Some(5),
        };

        let body = notification_body(&job, JobStatus::Failed, &summary);
        assert!(body.starts_with("Record: row 12\n"));
        assert!(body.contains("Interface: GigabitEthernet0/13\n"));
        assert!(body.contains("Requested by: -\n"));
        assert!(body.contains("Status: Failed\n"));
        assert!(body.contains("Change: DATA, 8 >> Printers, 5\n"));
    }
}
