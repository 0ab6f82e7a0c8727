use super::{
    types::{Config, NotifierBackend, RecordsBackend},
    ConfigError,
};
use crate::catalog::VlanCatalog;
use crate::notifier::is_plain_address;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker pool size is at least 1 and the poll interval is non-zero
/// - VLAN table is non-empty and every id is in 1..=4094
/// - Backend sections exist for the selected backends
/// - Google backends have either an OAuth client or a fixed token
/// - Operator addresses are bare mailboxes
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_workers must be at least 1".to_string(),
        ));
    }

    if config.orchestrator.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.poll_interval_ms must be greater than 0".to_string(),
        ));
    }

    if config.device.username.is_empty() {
        return Err(ConfigError::ValidationError(
            "device.username cannot be empty".to_string(),
        ));
    }

    if config.device.connect_timeout_secs == 0 || config.device.command_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "device timeouts must be greater than 0".to_string(),
        ));
    }

    VlanCatalog::new(config.vlans.clone())
        .map_err(|e| ConfigError::ValidationError(format!("vlans: {}", e)))?;

    if config.records.backend == RecordsBackend::Sheets {
        match &config.records.sheets {
            None => {
                return Err(ConfigError::ValidationError(
                    "records.backend is \"sheets\" but [records.sheets] is missing".to_string(),
                ))
            }
            Some(sheets) if sheets.spreadsheet_id.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "records.sheets.spreadsheet_id cannot be empty".to_string(),
                ))
            }
            Some(sheets) if config.google.is_none() && sheets.access_token.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "records.sheets.access_token is empty and no [google] client is configured"
                        .to_string(),
                ))
            }
            Some(_) => {}
        }
    }

    if config.notifier.backend == NotifierBackend::Gmail {
        match &config.notifier.gmail {
            None => {
                return Err(ConfigError::ValidationError(
                    "notifier.backend is \"gmail\" but [notifier.gmail] is missing".to_string(),
                ))
            }
            Some(gmail) if config.google.is_none() && gmail.access_token.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "notifier.gmail.access_token is empty and no [google] client is configured"
                        .to_string(),
                ))
            }
            Some(_) => {}
        }
    }

    if let Some(google) = &config.google {
        if google.client_id.is_empty()
            || google.client_secret.is_empty()
            || google.refresh_token.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "google.client_id, client_secret and refresh_token are all required".to_string(),
            ));
        }
    }

    if let Some(bad) = config
        .notifier
        .operators
        .iter()
        .find(|address| !is_plain_address(address))
    {
        return Err(ConfigError::ValidationError(format!(
            "notifier.operators contains an invalid address: {:?}",
            bad
        )));
    }

    Ok(())
}
