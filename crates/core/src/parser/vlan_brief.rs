//! `show vlan brief` parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::PortVlanFact;
use super::line_has_interface;

/// Name of the voice VLAN. Ports listed under it are never reported as the
/// port's assignment, since a phone port shows up under both VLANs.
pub const VOICE_VLAN_NAME: &str = "VOICE";

/// VLAN header rows start at column 0 with a 1-4 digit id.
static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,4})\s+(.*)$").expect("valid header regex"));

/// Values of the Status column; the VLAN name ends where one of these starts.
const STATUS_WORDS: &[&str] = &["active", "suspended", "act/lshut", "sus/lshut", "act/unsup"];

/// Find the VLAN an interface is assigned to.
///
/// Interface rows belong to the most recent header row. The voice VLAN is
/// skipped even when it is the only match, so a port that only appears
/// under the voice VLAN comes back as [`PortVlanFact::Unknown`].
pub fn current_assignment(raw_vlan_brief: &str, interface: &str) -> PortVlanFact {
    let mut pending: Option<(u16, String)> = None;

    for line in raw_vlan_brief.trim().lines() {
        if let Some(header) = parse_header(line) {
            pending = Some(header);
        }

        if !line_has_interface(line, interface) {
            continue;
        }

        if let Some((id, name)) = &pending {
            if !name.eq_ignore_ascii_case(VOICE_VLAN_NAME) {
                return PortVlanFact::assigned(name.clone(), *id);
            }
        }
    }

    PortVlanFact::Unknown
}

/// Parse a VLAN header row into `(id, name)`.
fn parse_header(line: &str) -> Option<(u16, String)> {
    let caps = HEADER_LINE.captures(line)?;
    let id: u16 = caps.get(1)?.as_str().parse().ok()?;

    let name = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split_whitespace()
        .take_while(|word| !STATUS_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ");

    Some((id, name))
}
