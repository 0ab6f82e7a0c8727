//! Cisco IOS / IOS-XE access switches.

use async_trait::async_trait;
use tracing::debug;

use super::interface::{normalize_interface, InterfaceError};
use super::types::{CliDialect, DeviceDriver, DeviceFamily, DeviceSession, PortProbe, SessionError};
use crate::parser::{current_assignment, is_trunk_port, PortVlanFact};

pub const SHOW_VLAN_BRIEF: &str = "show vlan brief";
pub const SHOW_INTERFACES_TRUNK: &str = "show interfaces trunk";

const CISCO_IOS_DIALECT: CliDialect = CliDialect {
    disable_paging: Some("terminal length 0"),
    enter_config: "configure terminal",
    exit_config: "end",
    save_config: "write memory",
    prompt_pattern: r"^[\w.\-@/:()]{1,63}[>#]\s*$",
    error_markers: &["% Invalid", "% Incomplete", "% Ambiguous", "% Unknown"],
};

/// Driver for Cisco IOS switches.
#[derive(Debug, Default, Clone, Copy)]
pub struct CiscoIosDriver;

impl CiscoIosDriver {
    pub fn new() -> Self {
        Self
    }

    /// Interface-scoped commands that move a port to `vlan_id`.
    pub fn access_vlan_commands(interface: &str, vlan_id: u16) -> Vec<String> {
        vec![
            format!("interface {}", interface),
            format!("switchport access vlan {}", vlan_id),
        ]
    }
}

#[async_trait]
impl DeviceDriver for CiscoIosDriver {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::CiscoIos
    }

    fn dialect(&self) -> &CliDialect {
        &CISCO_IOS_DIALECT
    }

    fn normalize_interface(&self, raw: &str) -> Result<String, InterfaceError> {
        normalize_interface(raw)
    }

    async fn probe(
        &self,
        session: &mut dyn DeviceSession,
        interface: &str,
    ) -> Result<PortProbe, SessionError> {
        let output = session.run(SHOW_VLAN_BRIEF).await?;
        let fact = current_assignment(&output, interface);
        if !fact.is_unknown() {
            return Ok(PortProbe::Access(fact));
        }

        debug!(interface, "Port not on an access VLAN, checking trunk listing");
        let trunks = session.run(SHOW_INTERFACES_TRUNK).await?;
        if is_trunk_port(&trunks, interface) {
            Ok(PortProbe::Trunk)
        } else {
            Ok(PortProbe::NotFound)
        }
    }

    async fn apply_change(
        &self,
        session: &mut dyn DeviceSession,
        interface: &str,
        vlan_id: u16,
    ) -> Result<(), SessionError> {
        let lines = Self::access_vlan_commands(interface, vlan_id);
        session.apply_config(&lines).await?;
        Ok(())
    }

    async fn verify(
        &self,
        session: &mut dyn DeviceSession,
        interface: &str,
    ) -> Result<PortVlanFact, SessionError> {
        let output = session.run(SHOW_VLAN_BRIEF).await?;
        Ok(current_assignment(&output, interface))
    }
}
