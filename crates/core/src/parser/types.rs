//! Facts extracted from device output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The access VLAN a port is assigned to, as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortVlanFact {
    /// The port is listed under this VLAN.
    Assigned { name: String, id: u16 },
    /// The port could not be located in the output.
    Unknown,
}

impl PortVlanFact {
    pub fn assigned(name: impl Into<String>, id: u16) -> Self {
        PortVlanFact::Assigned {
            name: name.into(),
            id,
        }
    }

    pub fn id(&self) -> Option<u16> {
        match self {
            PortVlanFact::Assigned { id, .. } => Some(*id),
            PortVlanFact::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PortVlanFact::Unknown)
    }
}

/// Renders as `"<name>, <id>"`, or `"None, -1"` for an unknown port.
impl fmt::Display for PortVlanFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortVlanFact::Assigned { name, id } => write!(f, "{}, {}", name, id),
            PortVlanFact::Unknown => write!(f, "None, -1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(PortVlanFact::assigned("DATA", 8).to_string(), "DATA, 8");
        assert_eq!(PortVlanFact::Unknown.to_string(), "None, -1");
    }

    #[test]
    fn test_accessors() {
        let fact = PortVlanFact::assigned("Printers", 5);
        assert_eq!(fact.id(), Some(5));
        assert!(!fact.is_unknown());

        assert_eq!(PortVlanFact::Unknown.id(), None);
        assert!(PortVlanFact::Unknown.is_unknown());
    }
}
