//! Pure parsers turning raw device output into structured facts.
//!
//! Nothing in here touches the network; every function takes the text a
//! device returned and answers one question about one interface.

mod trunk;
mod types;
mod vlan_brief;

pub use trunk::is_trunk_port;
pub use types::PortVlanFact;
pub use vlan_brief::{current_assignment, VOICE_VLAN_NAME};

/// Whether `interface` is one of the whitespace/comma separated tokens of
/// `line`. Token equality keeps `Gi0/1` from matching `Gi0/13`.
pub(crate) fn line_has_interface(line: &str, interface: &str) -> bool {
    if interface.is_empty() {
        return false;
    }
    line.split(|c: char| c.is_whitespace() || c == ',')
        .any(|token| token == interface)
}
