//! Testing utilities and mock implementations.
//!
//! Mocks stand in for every external seam (device sessions, the record
//! store, the notifier) so a whole job or poll cycle runs in-process.
//!
//! # Example
//!
//! ```rust,ignore
//! use steward_core::testing::{fixtures, MemoryRecordStore, MockDeviceConnector, MockNotifier};
//!
//! let device = MockDeviceConnector::new();
//! device.add_vlan(8, "DATA").await;
//! device.set_access_port("Gi0/13", 1).await;
//!
//! let records = MemoryRecordStore::with_records(vec![
//!     fixtures::change_record(2, "DATA", "10.0.0.1", "Gi0/13"),
//! ]).await;
//! let notifier = MockNotifier::new();
//! ```

mod mock_device;
mod mock_notifier;

pub use crate::records::MemoryRecordStore;
pub use mock_device::{MockDeviceConnector, SwitchState};
pub use mock_notifier::{MockNotifier, SentMessage};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::catalog::VlanCatalog;
    use crate::job::{ChangeRecord, RecordLocator};

    /// A pending record with every required field filled in.
    pub fn change_record(row: u32, group: &str, address: &str, interface: &str) -> ChangeRecord {
        ChangeRecord {
            locator: RecordLocator::row(row),
            desired_group: Some(group.to_string()),
            device_address: Some(address.to_string()),
            interface_spec: Some(interface.to_string()),
            notify_address: Some(format!("requester{}@example.org", row)),
            status: None,
        }
    }

    /// Catalog with DATA=8, Printers=12, Cameras=30.
    pub fn catalog() -> VlanCatalog {
        catalog_of(&[("DATA", 8), ("Printers", 12), ("Cameras", 30)])
    }

    pub fn catalog_of(entries: &[(&str, u16)]) -> VlanCatalog {
        let entries: BTreeMap<String, u16> = entries
            .iter()
            .map(|(name, id)| (name.to_string(), *id))
            .collect();
        VlanCatalog::new(entries).expect("fixture catalog is valid")
    }
}
