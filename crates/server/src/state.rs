use std::sync::Arc;
use steward_core::{Config, Orchestrator, SanitizedConfig, VlanCatalog};

/// Shared application state
pub struct AppState {
    config: Config,
    catalog: Arc<VlanCatalog>,
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: Config, catalog: Arc<VlanCatalog>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            catalog,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn catalog(&self) -> &VlanCatalog {
        &self.catalog
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}
