//! Google Sheets v4 backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{RecordStore, RecordStoreError};
use crate::config::{SheetColumns, SheetsConfig};
use crate::job::{ChangeRecord, RecordLocator, StatusUpdate};
use crate::metrics::observe_external;
use crate::oauth::{send_authorized, SendError, TokenSource};

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Reads request rows from a spreadsheet range and writes the status,
/// timestamp and summary cells back next to them.
pub struct SheetsRecordStore {
    client: Client,
    config: SheetsConfig,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeUpdate<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [[&'a str; 3]; 1],
}

impl SheetsRecordStore {
    pub fn new(config: SheetsConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, RecordStoreError> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(RecordStoreError::Config("spreadsheet_id is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| RecordStoreError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            tokens,
            base_url: SHEETS_API_URL.to_string(),
        })
    }

    /// Point at a different API root (e.g. a local emulator).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `'<sheet>'!<range>` or just `<range>`.
    fn qualified(&self, range: &str) -> String {
        match &self.config.sheet {
            Some(sheet) => format!("'{}'!{}", sheet.replace('\'', "''"), range),
            None => range.to_string(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url,
            urlencoding::encode(&self.config.spreadsheet_id),
            urlencoding::encode(&self.qualified(range))
        )
    }

    /// Cells written for a status update: status column and the two after it.
    fn status_range(&self, locator: &RecordLocator) -> String {
        let first = first_column_index(&self.config.range) + self.config.columns.status;
        format!(
            "{}{}:{}{}",
            column_letter(first),
            locator.row,
            column_letter(first + 2),
            locator.row
        )
    }
}

fn map_send_error(e: SendError) -> RecordStoreError {
    match e {
        SendError::Token(e) => RecordStoreError::Auth(e.to_string()),
        SendError::Http(e) if e.is_timeout() => RecordStoreError::Timeout,
        SendError::Http(e) => RecordStoreError::Request(e.to_string()),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RecordStoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(RecordStoreError::Api {
        status,
        body: body.chars().take(200).collect(),
    })
}

#[async_trait]
impl RecordStore for SheetsRecordStore {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn fetch_all(&self) -> Result<Vec<ChangeRecord>, RecordStoreError> {
        let started = Instant::now();
        let result: Result<Vec<ChangeRecord>, RecordStoreError> = async {
            let url = self.values_url(&self.config.range);
            let response = send_authorized(self.tokens.as_ref(), || self.client.get(&url))
                .await
                .map_err(map_send_error)?;
            let range: ValueRange = check_status(response)
                .await?
                .json()
                .await
                .map_err(|e| RecordStoreError::Parse(e.to_string()))?;
            Ok(rows_to_records(
                &range.values,
                self.config.first_row,
                &self.config.columns,
            ))
        }
        .await;

        observe_external("sheets", "fetch", result.is_ok(), started.elapsed().as_secs_f64());
        if let Ok(records) = &result {
            debug!(rows = records.len(), "Fetched sheet rows");
        }
        result
    }

    async fn write_status(
        &self,
        locator: &RecordLocator,
        update: &StatusUpdate,
    ) -> Result<(), RecordStoreError> {
        let started = Instant::now();
        let range = self.qualified(&self.status_range(locator));
        let body = ValueRangeUpdate {
            range: &range,
            major_dimension: "ROWS",
            values: [[
                update.status.as_str(),
                update.timestamp.as_str(),
                update.summary.as_str(),
            ]],
        };

        let result: Result<(), RecordStoreError> = async {
            let url = format!(
                "{}?valueInputOption=USER_ENTERED",
                self.values_url(&self.status_range(locator))
            );
            let response =
                send_authorized(self.tokens.as_ref(), || self.client.put(&url).json(&body))
                    .await
                    .map_err(map_send_error)?;
            check_status(response).await?;
            Ok(())
        }
        .await;

        observe_external("sheets", "write", result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!(%locator, range = %range, "Sheet write failed: {}", e);
        }
        result
    }
}

/// Zero-based column index to its A1 letters: 0 → `A`, 25 → `Z`, 26 → `AA`.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Zero-based index of the first column of an A1 range (`C2:I` → 2).
fn first_column_index(range: &str) -> usize {
    let start = range.rsplit('!').next().unwrap_or(range);
    start
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .fold(0usize, |acc, c| {
            acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1)
        })
        .saturating_sub(1)
}

fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Map the sheet's value rows to records. Rows the API trimmed short simply
/// lack the trailing cells.
fn rows_to_records(rows: &[Vec<Value>], first_row: u32, columns: &SheetColumns) -> Vec<ChangeRecord> {
    rows.iter()
        .enumerate()
        .map(|(offset, cells)| {
            let cell = |idx: usize| cells.get(idx).and_then(cell_text);
            ChangeRecord {
                locator: RecordLocator::row(first_row + offset as u32),
                desired_group: cell(columns.desired_group),
                device_address: cell(columns.device_address),
                interface_spec: cell(columns.interface),
                notify_address: cell(columns.notify_address),
                status: cell(columns.status),
            }
        })
        .collect()
}
