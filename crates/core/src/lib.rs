pub mod catalog;
pub mod config;
pub mod device;
pub mod executor;
pub mod job;
pub mod metrics;
pub mod notifier;
pub mod oauth;
pub mod orchestrator;
pub mod parser;
pub mod pool;
pub mod records;
pub mod testing;

pub use catalog::{CatalogError, VlanCatalog};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, NotifierBackend,
    RecordsBackend, SanitizedConfig,
};
pub use device::{
    DeviceConnector, DeviceDriver, DeviceFamily, DeviceSession, DeviceTarget, DriverRegistry,
    SessionError, SshConnector,
};
pub use executor::{ChangeError, ChangeExecutor};
pub use job::{ChangeRecord, Job, JobReport, JobStatus, RecordLocator, StatusUpdate};
pub use notifier::{GmailNotifier, LogNotifier, Notifier, NotifyError};
pub use oauth::{RefreshingToken, StaticToken, TokenError, TokenSource};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus};
pub use parser::PortVlanFact;
pub use pool::{JobHandler, PoolStatus, WorkerPool};
pub use records::{MemoryRecordStore, RecordStore, RecordStoreError, SheetsRecordStore};
