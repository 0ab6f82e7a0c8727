//! In-memory record store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordStore, RecordStoreError};
use crate::job::{ChangeRecord, RecordLocator, StatusUpdate};

/// Records held in process memory, ordered by locator.
///
/// Backs the `memory` records backend and the test suites. Every status
/// write is kept so tests can assert on the full sequence.
///
/// # Example
///
/// ```rust,ignore
/// let store = MemoryRecordStore::new();
/// store.insert(fixtures::change_record(2, "DATA", "10.0.0.1", "Gi0/13")).await;
///
/// // ... run a cycle ...
///
/// let labels = store.status_history(RecordLocator::row(2)).await;
/// assert_eq!(labels.last().map(String::as_str), Some("Successful"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<RecordLocator, ChangeRecord>>>,
    writes: Arc<RwLock<Vec<(RecordLocator, StatusUpdate)>>>,
    fail_fetch: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_records(records: impl IntoIterator<Item = ChangeRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record).await;
        }
        store
    }

    /// Add or replace a record.
    pub async fn insert(&self, record: ChangeRecord) {
        self.records.write().await.insert(record.locator, record);
    }

    pub async fn record(&self, locator: RecordLocator) -> Option<ChangeRecord> {
        self.records.read().await.get(&locator).cloned()
    }

    /// Current status cell of a record.
    pub async fn status_of(&self, locator: RecordLocator) -> Option<String> {
        self.records
            .read()
            .await
            .get(&locator)
            .and_then(|r| r.status.clone())
    }

    /// Every write, in order.
    pub async fn writes(&self) -> Vec<(RecordLocator, StatusUpdate)> {
        self.writes.read().await.clone()
    }

    /// Status labels written to one record, in order.
    pub async fn status_history(&self, locator: RecordLocator) -> Vec<String> {
        self.writes
            .read()
            .await
            .iter()
            .filter(|(l, _)| *l == locator)
            .map(|(_, u)| u.status.clone())
            .collect()
    }

    /// Last write to one record.
    pub async fn last_update(&self, locator: RecordLocator) -> Option<StatusUpdate> {
        self.writes
            .read()
            .await
            .iter()
            .rev()
            .find(|(l, _)| *l == locator)
            .map(|(_, u)| u.clone())
    }

    /// Make `fetch_all` fail until reset.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make `write_status` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_all(&self) -> Result<Vec<ChangeRecord>, RecordStoreError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Request("simulated fetch failure".into()));
        }
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn write_status(
        &self,
        locator: &RecordLocator,
        update: &StatusUpdate,
    ) -> Result<(), RecordStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Request("simulated write failure".into()));
        }
        {
            let mut records = self.records.write().await;
            let record = records
                .get_mut(locator)
                .ok_or(RecordStoreError::NotFound(*locator))?;
            record.status = Some(update.status.clone());
        }
        self.writes.write().await.push((*locator, update.clone()));
        Ok(())
    }
}
