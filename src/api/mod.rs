//! The `TableBackend` trait and its implementations.
//!
//! The engine only ever talks to `dyn TableBackend`. `GoogleBackend` implements it with the Google
//! Sheets and Drive APIs, `MemoryBackend` implements it in memory for tests and for running the
//! whole app without touching Google.

mod files;
mod google;
mod memory;
mod oauth;

use crate::model::CellRef;
use crate::{Config, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub use memory::MemoryBackend;
#[cfg(test)]
pub(crate) use memory::csv_rows;
pub(crate) use oauth::TokenProvider;

// OAuth scopes required for Sheets and Drive access. Drive is needed to find spreadsheets by name.
const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// When this environment variable is set and non-empty, the in-memory backend is used.
pub const TEST_MODE_ENV: &str = "GIG_LEDGER_IN_TEST_MODE";

/// Selects which `TableBackend` implementation to use.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Testing,
}

impl Mode {
    /// `Mode::Testing` if `GIG_LEDGER_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Testing,
            _ => Mode::Google,
        }
    }
}

/// A table (a spreadsheet) opened by name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TableRef {
    pub id: String,
    pub name: String,
}

/// A worksheet inside a table.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WorksheetRef {
    pub table_id: String,
    pub sheet_id: i64,
    pub title: String,
}

/// A single cell write.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CellUpdate {
    pub cell: CellRef,
    pub value: String,
}

impl CellUpdate {
    pub fn new(cell: CellRef, value: impl Into<String>) -> Self {
        Self {
            cell,
            value: value.into(),
        }
    }
}

/// A data row keyed by the header row of its worksheet.
pub type Record = HashMap<String, String>;

/// Operations the engine needs from a spreadsheet service.
///
/// Every method is one remote operation. Implementations own their concurrency: they are shared
/// between conversations behind an `Arc` and may be called concurrently.
///
/// Errors are classified: `open_table` returns `ErrorType::TableNotFound` and `open_worksheet`
/// returns `ErrorType::WorksheetNotFound` when the object does not exist; everything else is
/// `ErrorType::Backend`.
#[async_trait::async_trait]
pub trait TableBackend: Send + Sync {
    /// Opens the table with exactly this name.
    async fn open_table(&self, name: &str) -> Result<TableRef>;

    /// Opens the worksheet with exactly this title.
    async fn open_worksheet(&self, table: &TableRef, title: &str) -> Result<WorksheetRef>;

    /// Copies `worksheet` into `target` and returns the new worksheet's id.
    async fn duplicate_worksheet(&self, worksheet: &WorksheetRef, target: &TableRef)
        -> Result<i64>;

    /// Looks up a worksheet by id, e.g. one returned by `duplicate_worksheet`.
    async fn resolve_worksheet(&self, table: &TableRef, sheet_id: i64) -> Result<WorksheetRef>;

    /// Writes cells as if a user had typed them, so formulas are evaluated.
    async fn update_cells(&self, worksheet: &WorksheetRef, cells: &[CellUpdate]) -> Result<()>;

    /// Renames the worksheet. Titles are unique within a table.
    async fn update_title(&self, worksheet: &WorksheetRef, title: &str) -> Result<WorksheetRef>;

    /// Appends a row after the last non-empty row.
    async fn append_row(&self, worksheet: &WorksheetRef, values: &[String]) -> Result<()>;

    /// Reads every row below the header row, keyed by header. Missing trailing cells read as
    /// empty strings.
    async fn read_all_rows(&self, worksheet: &WorksheetRef) -> Result<Vec<Record>>;

    /// Reads a single cell's displayed value; an empty cell reads as an empty string.
    async fn read_cell(&self, worksheet: &WorksheetRef, cell: CellRef) -> Result<String>;
}

/// Creates the backend for `mode`.
pub async fn backend(config: &Config, mode: Mode) -> Result<Arc<dyn TableBackend>> {
    match mode {
        Mode::Google => {
            debug!("Using the Google Sheets backend");
            let token_provider =
                TokenProvider::load(&config.client_secret_path(), &config.token_path()).await?;
            Ok(Arc::new(google::GoogleBackend::new(
                token_provider,
                config.max_in_flight(),
            )))
        }
        Mode::Testing => {
            debug!("Using the in-memory backend");
            Ok(Arc::new(MemoryBackend::seeded(config.schema())))
        }
    }
}

/// Runs the interactive OAuth consent flow and saves the resulting token file.
pub async fn authorize(config: &Config) -> Result<()> {
    TokenProvider::initialize(&config.client_secret_path(), &config.token_path())
        .await
        .map(|_| ())
}

/// Converts raw rows into records keyed by the first row. Missing trailing cells become empty
/// strings, and a sheet without a header row has no records.
pub(crate) fn records(rows: &[Vec<String>]) -> Vec<Record> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    data.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(ix, h)| (h.clone(), row.get(ix).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

/// Quotes a worksheet title for use in an A1 range, e.g. `'Общие траты'!A:ZZ`.
pub(crate) fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_title() {
        assert_eq!(quote_title("Общие траты"), "'Общие траты'");
        assert_eq!(quote_title("Rock'n'roll"), "'Rock''n''roll'");
    }

    #[test]
    fn test_records() {
        assert!(records(&[]).is_empty());
        let rows = vec![
            vec!["Дата".to_string(), "Сумма".to_string()],
            vec!["22-05-2025".to_string()],
        ];
        let records = records(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Дата"], "22-05-2025");
        assert_eq!(records[0]["Сумма"], "");
    }
}
