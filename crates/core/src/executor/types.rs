//! Failure kinds of a change attempt.

use thiserror::Error;

use crate::device::{InterfaceError, RegistryError, SessionError};
use crate::job::JobStatus;
use crate::parser::PortVlanFact;

/// Why a change attempt ended without success.
///
/// Every variant maps to exactly one terminal [`JobStatus`]; none of them
/// escape the job that raised them.
#[derive(Debug, Clone, Error)]
pub enum ChangeError {
    #[error("invalid interface: {0}")]
    InvalidInterface(#[from] InterfaceError),

    #[error("no driver for device: {0}")]
    NoDriver(#[from] RegistryError),

    #[error("VLAN '{0}' is not in the catalog")]
    UnknownVlanName(String),

    #[error("could not open session: {0}")]
    Connect(SessionError),

    #[error("port {0} not found on device")]
    PortNotFound(String),

    #[error("port {0} is a trunk")]
    PortIsTrunk(String),

    #[error("device rejected the change: {0}")]
    Rejected(SessionError),

    #[error("port reports {actual} after change, expected VLAN {expected}")]
    VerificationFailed { expected: u16, actual: PortVlanFact },

    #[error("session lost: {source}")]
    Transport {
        source: SessionError,
        change_attempted: bool,
    },
}

impl ChangeError {
    /// Classify a session error raised after the session was opened.
    pub fn from_session(err: SessionError, change_attempted: bool) -> Self {
        match err {
            SessionError::CommandRejected { .. } if change_attempted => ChangeError::Rejected(err),
            source => ChangeError::Transport {
                source,
                change_attempted,
            },
        }
    }

    /// Terminal status recorded for this failure.
    pub fn status(&self) -> JobStatus {
        match self {
            ChangeError::InvalidInterface(_) | ChangeError::NoDriver(_) => {
                JobStatus::InvalidRequest
            }
            ChangeError::UnknownVlanName(_) => JobStatus::UnknownVlan,
            ChangeError::Connect(SessionError::AuthFailure(_)) => JobStatus::AuthFailure,
            ChangeError::Connect(_) => JobStatus::ConnTimeout,
            ChangeError::PortNotFound(_) => JobStatus::PortNotFound,
            ChangeError::PortIsTrunk(_) => JobStatus::PortIsTrunk,
            ChangeError::Rejected(_) | ChangeError::VerificationFailed { .. } => JobStatus::Failed,
            ChangeError::Transport {
                change_attempted, ..
            } => JobStatus::TransportError {
                change_attempted: *change_attempted,
            },
        }
    }
}
