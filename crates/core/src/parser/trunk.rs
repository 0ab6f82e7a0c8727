//! `show interfaces trunk` parsing.

use super::line_has_interface;

/// Whether the interface shows up anywhere in a trunk listing.
///
/// The listing repeats each trunk port in several tables (mode, allowed
/// VLANs, forwarding state); one occurrence is enough.
pub fn is_trunk_port(raw_trunk_listing: &str, interface: &str) -> bool {
    raw_trunk_listing
        .trim()
        .lines()
        .any(|line| line_has_interface(line, interface))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUNK_LISTING: &str = "\
Port        Mode             Encapsulation  Status        Native vlan
Gi0/1       on               802.1q         trunking      1
Gi0/24      desirable        n-802.1q       trunking      1

Port        Vlans allowed on trunk
Gi0/1       1-4094
Gi0/24      1-4094

Port        Vlans allowed and active in management domain
Gi0/1       1-12,100
Gi0/24      1-12,100
";

    #[test]
    fn test_listed_port_is_trunk() {
        assert!(is_trunk_port(TRUNK_LISTING, "Gi0/1"));
        assert!(is_trunk_port(TRUNK_LISTING, "Gi0/24"));
    }

    #[test]
    fn test_unlisted_port_is_not_trunk() {
        assert!(!is_trunk_port(TRUNK_LISTING, "Gi0/13"));
        assert!(!is_trunk_port(TRUNK_LISTING, "Gi0/2"));
    }

    #[test]
    fn test_empty_listing_is_not_trunk() {
        assert!(!is_trunk_port("", "Gi0/1"));
        assert!(!is_trunk_port("\n\n", "Gi0/1"));
    }
}
