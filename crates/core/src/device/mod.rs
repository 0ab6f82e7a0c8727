//! Device access: sessions, transports and per-family drivers.

mod cisco_ios;
mod interface;
mod registry;
mod ssh;
mod types;

pub use cisco_ios::{CiscoIosDriver, SHOW_INTERFACES_TRUNK, SHOW_VLAN_BRIEF};
pub use interface::{normalize_interface, InterfaceError};
pub use registry::{DriverRegistry, RegistryError};
pub use ssh::{SshConnector, SshSession};
pub use types::{
    CliDialect, DeviceConnector, DeviceDriver, DeviceFamily, DeviceSession, DeviceTarget,
    PortProbe, SessionError,
};
