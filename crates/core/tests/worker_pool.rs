//! Worker pool integration tests: many jobs, few workers, real executor.

use std::sync::Arc;
use std::time::Duration;

use steward_core::{
    device::{DeviceFamily, DriverRegistry},
    job::{Job, JobBatch, JobStatus, RecordLocator},
    testing::{fixtures, MemoryRecordStore, MockDeviceConnector, MockNotifier},
    ChangeExecutor, WorkerPool,
};

async fn setup(ports: u32) -> (MockDeviceConnector, Arc<MemoryRecordStore>, Arc<ChangeExecutor>) {
    let device = MockDeviceConnector::new();
    device.add_vlan(8, "DATA").await;
    device.add_vlan(12, "Printers").await;
    for n in 1..=ports {
        device.set_access_port(&format!("Gi0/{}", n), 8).await;
    }
    device.set_command_delay(Duration::from_millis(5)).await;

    let records = Arc::new(MemoryRecordStore::new());
    let executor = Arc::new(ChangeExecutor::new(
        Arc::new(device.clone()),
        Arc::new(DriverRegistry::builtin(DeviceFamily::CiscoIos)),
        Arc::new(fixtures::catalog()),
        records.clone(),
        Arc::new(MockNotifier::new()),
        Vec::new(),
    ));
    (device, records, executor)
}

async fn batch_for(records: &MemoryRecordStore, ports: u32) -> JobBatch {
    let mut batch = JobBatch::new();
    for n in 1..=ports {
        let record = fixtures::change_record(n + 1, "Printers", "10.0.0.1", &format!("Gi0/{}", n));
        records.insert(record.clone()).await;
        batch.push(Job::from_record(&record, 22).unwrap());
    }
    batch
}

#[tokio::test]
async fn test_every_job_runs_exactly_once_within_worker_bound() {
    let (device, records, executor) = setup(12).await;
    let pool = WorkerPool::new(3, executor);

    let reports = pool.run_batch(batch_for(&records, 12).await).await.unwrap();

    assert_eq!(reports.len(), 12);
    assert!(reports.iter().all(|r| r.status == JobStatus::Succeeded));
    assert!(device.peak_sessions() <= 3);
    assert!(device.peak_sessions() >= 1);
    assert_eq!(device.opened(), 12);
    assert_eq!(device.closed(), 12);

    let mut rows: Vec<u32> = reports.iter().map(|r| r.locator.row).collect();
    rows.sort_unstable();
    assert_eq!(rows, (2..=13).collect::<Vec<_>>());

    for row in 2..=13 {
        let terminal = records
            .status_history(RecordLocator::row(row))
            .await
            .iter()
            .filter_map(|label| JobStatus::from_label(label))
            .filter(JobStatus::is_terminal)
            .count();
        assert_eq!(terminal, 1, "row {} should get one terminal status", row);
    }

    let status = pool.status().await;
    assert_eq!(status.processed, 12);
    assert_eq!(status.active, 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_more_workers_than_jobs() {
    let (device, records, executor) = setup(2).await;
    let pool = WorkerPool::new(8, executor);

    let reports = pool.run_batch(batch_for(&records, 2).await).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert!(device.peak_sessions() <= 2);
    assert_eq!(device.access_vlan("Gi0/1").await, Some(12));
    assert_eq!(device.access_vlan("Gi0/2").await, Some(12));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_single_worker_serializes_sessions() {
    let (device, records, executor) = setup(4).await;
    let pool = WorkerPool::new(1, executor);

    let reports = pool.run_batch(batch_for(&records, 4).await).await.unwrap();

    assert_eq!(reports.len(), 4);
    assert_eq!(device.peak_sessions(), 1);
    pool.shutdown().await;
}
