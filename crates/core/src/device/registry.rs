//! Resolves which driver handles a given device.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::cisco_ios::CiscoIosDriver;
use super::types::{DeviceDriver, DeviceFamily};
use crate::config::DeviceConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no driver registered for device family {0}")]
    MissingDriver(DeviceFamily),
}

/// Maps device addresses to family drivers.
///
/// Addresses listed in the overrides use their configured family, every
/// other device uses the default family.
pub struct DriverRegistry {
    drivers: HashMap<DeviceFamily, Arc<dyn DeviceDriver>>,
    default_family: DeviceFamily,
    overrides: HashMap<String, DeviceFamily>,
}

impl DriverRegistry {
    /// Registry with every built-in driver and no overrides.
    pub fn builtin(default_family: DeviceFamily) -> Self {
        let mut drivers: HashMap<DeviceFamily, Arc<dyn DeviceDriver>> = HashMap::new();
        drivers.insert(DeviceFamily::CiscoIos, Arc::new(CiscoIosDriver::new()));
        Self {
            drivers,
            default_family,
            overrides: HashMap::new(),
        }
    }

    /// Registry built from the `[device]` config section.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::builtin(config.default_family);
        for entry in &config.overrides {
            registry = registry.with_override(entry.address.clone(), entry.family);
        }
        registry.check()?;
        Ok(registry)
    }

    /// Pin a device address to a family.
    pub fn with_override(mut self, address: impl Into<String>, family: DeviceFamily) -> Self {
        self.overrides.insert(address.into(), family);
        self
    }

    /// Every referenced family must have a driver.
    pub fn check(&self) -> Result<(), RegistryError> {
        std::iter::once(&self.default_family)
            .chain(self.overrides.values())
            .find(|family| !self.drivers.contains_key(family))
            .map_or(Ok(()), |family| Err(RegistryError::MissingDriver(*family)))
    }

    pub fn family_for(&self, address: &str) -> DeviceFamily {
        self.overrides
            .get(address)
            .copied()
            .unwrap_or(self.default_family)
    }

    /// Driver for a device address.
    pub fn resolve(&self, address: &str) -> Result<Arc<dyn DeviceDriver>, RegistryError> {
        let family = self.family_for(address);
        self.drivers
            .get(&family)
            .cloned()
            .ok_or(RegistryError::MissingDriver(family))
    }
}
