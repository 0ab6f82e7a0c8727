//! VLAN catalog: the static name → id table requests are resolved against.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

/// Highest VLAN id usable on an access port.
pub const MAX_VLAN_ID: u16 = 4094;

/// Errors raised while building a catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog is empty")]
    Empty,

    #[error("VLAN name cannot be blank")]
    BlankName,

    #[error("VLAN '{name}' has id {id}, expected 1..=4094")]
    InvalidId { name: String, id: u16 },
}

/// Read-only mapping of human-readable VLAN names to numeric ids.
///
/// Built once at startup and shared behind an `Arc`; it is never mutated
/// afterwards, so workers read it without synchronization.
#[derive(Debug, Clone)]
pub struct VlanCatalog {
    entries: HashMap<String, u16>,
}

impl VlanCatalog {
    /// Build a catalog, rejecting blank names and ids outside 1..=4094.
    pub fn new(entries: BTreeMap<String, u16>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut map = HashMap::with_capacity(entries.len());
        for (name, id) in entries {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CatalogError::BlankName);
            }
            if id == 0 || id > MAX_VLAN_ID {
                return Err(CatalogError::InvalidId { name, id });
            }
            map.insert(name, id);
        }

        Ok(Self { entries: map })
    }

    /// Numeric id for a VLAN name, `None` when the name is not catalogued.
    ///
    /// Exact match on the trimmed name; form submissions come from a fixed
    /// drop-down so case folding would only hide typos in the config.
    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.entries.get(name.trim()).copied()
    }

    /// Every `(name, id)` pair, ordered by id then name.
    pub fn entries(&self) -> Vec<(&str, u16)> {
        let mut entries: Vec<(&str, u16)> = self
            .entries
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, u16)]) -> BTreeMap<String, u16> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let catalog =
            VlanCatalog::new(entries(&[("DATA", 8), ("Food Services", 2)])).unwrap();
        assert_eq!(catalog.lookup("DATA"), Some(8));
        assert_eq!(catalog.lookup("Food Services"), Some(2));
        assert_eq!(catalog.lookup("  DATA "), Some(8));
        assert_eq!(catalog.lookup("Guest"), None);
        assert_eq!(catalog.lookup("data"), None);
    }

    #[test]
    fn test_entries_ordered_by_id() {
        let catalog =
            VlanCatalog::new(entries(&[("Printers", 12), ("DATA", 8), ("Cameras", 30)])).unwrap();
        assert_eq!(
            catalog.entries(),
            vec![("DATA", 8), ("Printers", 12), ("Cameras", 30)]
        );
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert_eq!(
            VlanCatalog::new(BTreeMap::new()).unwrap_err(),
            CatalogError::Empty
        );
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let err = VlanCatalog::new(entries(&[("Zero", 0)])).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidId { id: 0, .. }));

        let err = VlanCatalog::new(entries(&[("Reserved", 4095)])).unwrap_err();
        assert_eq!(err.to_string(), "VLAN 'Reserved' has id 4095, expected 1..=4094");
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = VlanCatalog::new(entries(&[("   ", 10)])).unwrap_err();
        assert_eq!(err, CatalogError::BlankName);
    }
}
