//! Types for device sessions and device-family drivers.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::interface::InterfaceError;
use crate::parser::PortVlanFact;

/// Errors that can occur while talking to a device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// Connect or authentication did not finish in time.
    #[error("Connection timed out: {0}")]
    Timeout(String),

    /// The device could not be reached at all.
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// The device answered a command with an error marker.
    #[error("Command rejected: {command}: {output}")]
    CommandRejected { command: String, output: String },

    /// The session broke after it was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The session was already closed.
    #[error("Session closed")]
    Closed,
}

/// Management address of one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceTarget {
    pub address: String,
    pub port: u16,
}

impl DeviceTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Supported device families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFamily {
    #[default]
    CiscoIos,
    // Future: ArubaOs, ExtremeExos
}

impl DeviceFamily {
    /// Returns the string representation used in config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFamily::CiscoIos => "cisco_ios",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CLI conventions of a device family, used by the transport to drive an
/// interactive shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliDialect {
    /// Sent once after login so long outputs are not paginated.
    pub disable_paging: Option<&'static str>,
    pub enter_config: &'static str,
    pub exit_config: &'static str,
    /// Copies the running config to durable storage.
    pub save_config: &'static str,
    /// Regex matched against the last line of buffered output.
    pub prompt_pattern: &'static str,
    /// Prefixes the device uses for rejected commands.
    pub error_markers: &'static [&'static str],
}

impl CliDialect {
    /// Returns the first error marker found in `output`.
    pub fn find_error(&self, output: &str) -> Option<&'static str> {
        self.error_markers
            .iter()
            .copied()
            .find(|marker| output.contains(marker))
    }
}

/// An open management session to one device.
///
/// Implementations hold exactly one live connection. `close` must be called
/// on every exit path; calling it twice is a no-op.
#[async_trait]
pub trait DeviceSession: Send {
    /// Run one command and return its raw textual output.
    async fn run(&mut self, command: &str) -> Result<String, SessionError>;

    /// Enter configuration mode, send `lines` in order, and leave it again.
    async fn apply_config(&mut self, lines: &[String]) -> Result<String, SessionError>;

    /// Commit the running configuration to durable storage.
    async fn persist(&mut self) -> Result<(), SessionError>;

    /// Release the connection.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens device sessions.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Open a session, bounded by the connector's connect timeout.
    ///
    /// Only [`SessionError::AuthFailure`], [`SessionError::Timeout`] and
    /// [`SessionError::Unreachable`] are returned.
    async fn open(
        &self,
        target: &DeviceTarget,
        dialect: &CliDialect,
    ) -> Result<Box<dyn DeviceSession>, SessionError>;
}

/// What probing a port revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortProbe {
    /// Access port on a known VLAN.
    Access(PortVlanFact),
    /// Listed as a trunk; not a valid access-change target.
    Trunk,
    /// Not present in any listing.
    NotFound,
}

/// Capability of one device family: how to read and change a port's VLAN.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    fn family(&self) -> DeviceFamily;

    fn dialect(&self) -> &CliDialect;

    /// Canonicalize a submitted interface name to the token the device
    /// prints in its listings.
    fn normalize_interface(&self, raw: &str) -> Result<String, InterfaceError>;

    /// Read the port's current assignment, falling back to the trunk
    /// listing when the port is not on any access VLAN.
    async fn probe(
        &self,
        session: &mut dyn DeviceSession,
        interface: &str,
    ) -> Result<PortProbe, SessionError>;

    /// Set the port's access VLAN as one configuration-set.
    async fn apply_change(
        &self,
        session: &mut dyn DeviceSession,
        interface: &str,
        vlan_id: u16,
    ) -> Result<(), SessionError>;

    /// Re-read the port's assignment after a change.
    async fn verify(
        &self,
        session: &mut dyn DeviceSession,
        interface: &str,
    ) -> Result<PortVlanFact, SessionError>;
}
