use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::device::DeviceFamily;
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    pub device: DeviceConfig,
    /// VLAN name to numeric id.
    pub vlans: BTreeMap<String, u16>,
    pub records: RecordsConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// OAuth client shared by the Google backends.
    #[serde(default)]
    pub google: Option<GoogleAuthConfig>,
}

/// Status API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Management access to the switches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub username: String,
    pub password: String,
    /// SSH port used for every device.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Bound on TCP connect plus authentication.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Bound on a single command round-trip.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Family used for devices without an override.
    #[serde(default)]
    pub default_family: DeviceFamily,
    /// Verify host keys against the user's known_hosts.
    #[serde(default)]
    pub strict_host_keys: bool,
    #[serde(default)]
    pub overrides: Vec<DeviceOverride>,
}

/// Per-address device family override.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceOverride {
    pub address: String,
    pub family: DeviceFamily,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    30
}

/// External record store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordsConfig {
    pub backend: RecordsBackend,
    /// Zone the status timestamps are written in.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Google Sheets settings (required when backend = "sheets")
    #[serde(default)]
    pub sheets: Option<SheetsConfig>,
}

/// Available record store backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordsBackend {
    Sheets,
    /// In-process store, useful for dry runs.
    Memory,
}

/// Google Sheets request form configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Fixed bearer token with the spreadsheets scope, used only when no
    /// `[google]` client is configured.
    #[serde(default)]
    pub access_token: String,
    /// Optional tab name, prefixed to every range.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Data range in A1 notation, excluding the header row.
    #[serde(default = "default_sheet_range")]
    pub range: String,
    /// Sheet row number of the first row in `range`.
    #[serde(default = "default_first_row")]
    pub first_row: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub columns: SheetColumns,
}

/// Zero-based column positions inside the data range.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SheetColumns {
    #[serde(default = "default_desired_group_col")]
    pub desired_group: usize,
    #[serde(default = "default_device_address_col")]
    pub device_address: usize,
    #[serde(default = "default_interface_col")]
    pub interface: usize,
    #[serde(default = "default_notify_address_col")]
    pub notify_address: usize,
    /// Status column; the timestamp and change summary follow it.
    #[serde(default = "default_status_col")]
    pub status: usize,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            desired_group: default_desired_group_col(),
            device_address: default_device_address_col(),
            interface: default_interface_col(),
            notify_address: default_notify_address_col(),
            status: default_status_col(),
        }
    }
}

fn default_timezone() -> Tz {
    Tz::UTC
}

fn default_sheet_range() -> String {
    "A2:I".to_string()
}

fn default_first_row() -> u32 {
    2
}

fn default_desired_group_col() -> usize {
    1
}

fn default_device_address_col() -> usize {
    3
}

fn default_interface_col() -> usize {
    4
}

fn default_notify_address_col() -> usize {
    5
}

fn default_status_col() -> usize {
    6
}

fn default_timeout() -> u32 {
    30
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_backend")]
    pub backend: NotifierBackend,
    /// Recipients of every failure notification.
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default)]
    pub gmail: Option<GmailConfig>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            backend: default_notifier_backend(),
            operators: Vec::new(),
            gmail: None,
        }
    }
}

fn default_notifier_backend() -> NotifierBackend {
    NotifierBackend::Log
}

/// Available notifier backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierBackend {
    Gmail,
    Log,
}

/// Gmail API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GmailConfig {
    /// Fixed bearer token with the gmail.send scope, used only when no
    /// `[google]` client is configured.
    #[serde(default)]
    pub access_token: String,
    /// From header; empty lets Gmail use the authenticated account.
    #[serde(default)]
    pub sender: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Google OAuth client; access tokens are minted from the refresh token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub device: SanitizedDeviceConfig,
    pub vlans: BTreeMap<String, u16>,
    pub records: SanitizedRecordsConfig,
    pub notifier: SanitizedNotifierConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<SanitizedGoogleAuthConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDeviceConfig {
    pub username: String,
    pub password_configured: bool,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub default_family: String,
    pub strict_host_keys: bool,
    pub overrides: Vec<DeviceOverride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRecordsConfig {
    pub backend: String,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<SanitizedSheetsConfig>,
}

/// Sanitized sheets config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSheetsConfig {
    pub spreadsheet_id: String,
    pub access_token_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub range: String,
    pub first_row: u32,
}

/// Sanitized OAuth client (secret and refresh token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGoogleAuthConfig {
    pub client_id: String,
    pub client_secret_configured: bool,
    pub refresh_token_configured: bool,
    pub token_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub backend: String,
    pub operators: Vec<String>,
    pub gmail_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            orchestrator: config.orchestrator.clone(),
            device: SanitizedDeviceConfig {
                username: config.device.username.clone(),
                password_configured: !config.device.password.is_empty(),
                port: config.device.port,
                connect_timeout_secs: config.device.connect_timeout_secs,
                command_timeout_secs: config.device.command_timeout_secs,
                default_family: config.device.default_family.as_str().to_string(),
                strict_host_keys: config.device.strict_host_keys,
                overrides: config.device.overrides.clone(),
            },
            vlans: config.vlans.clone(),
            records: SanitizedRecordsConfig {
                backend: match config.records.backend {
                    RecordsBackend::Sheets => "sheets".to_string(),
                    RecordsBackend::Memory => "memory".to_string(),
                },
                timezone: config.records.timezone.name().to_string(),
                sheets: config.records.sheets.as_ref().map(|s| SanitizedSheetsConfig {
                    spreadsheet_id: s.spreadsheet_id.clone(),
                    access_token_configured: !s.access_token.is_empty(),
                    sheet: s.sheet.clone(),
                    range: s.range.clone(),
                    first_row: s.first_row,
                }),
            },
            notifier: SanitizedNotifierConfig {
                backend: match config.notifier.backend {
                    NotifierBackend::Gmail => "gmail".to_string(),
                    NotifierBackend::Log => "log".to_string(),
                },
                operators: config.notifier.operators.clone(),
                gmail_configured: config.notifier.gmail.is_some(),
            },
            google: config.google.as_ref().map(|g| SanitizedGoogleAuthConfig {
                client_id: g.client_id.clone(),
                client_secret_configured: !g.client_secret.is_empty(),
                refresh_token_configured: !g.refresh_token.is_empty(),
                token_url: g.token_url.clone(),
            }),
        }
    }
}
