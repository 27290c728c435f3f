//! Implements the `TableBackend` trait with the Google Sheets and Drive APIs.
//!
//! Value reads and cell writes go through the `sheets` client. The calls it does not cover
//! (finding a spreadsheet by name, copying a worksheet, renaming a worksheet and appending a row)
//! are plain REST calls made with `reqwest`.

use crate::api::{
    quote_title, records, CellUpdate, Record, TableBackend, TableRef, TokenProvider, WorksheetRef,
};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::CellRef;
use crate::Result;
use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sheets::types::{
    BatchUpdateValuesRequest, DateTimeRenderOption, Dimension, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use sheets::ClientError;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{trace, warn};
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Talks to Google. The token provider sits behind a mutex so that only one task refreshes the
/// token at a time, and a semaphore bounds the number of requests in flight.
pub(super) struct GoogleBackend {
    token_provider: Mutex<TokenProvider>,
    http: reqwest::Client,
    permits: Semaphore,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

impl GoogleBackend {
    pub(super) fn new(token_provider: TokenProvider, max_in_flight: usize) -> Self {
        Self {
            token_provider: Mutex::new(token_provider),
            http: reqwest::Client::new(),
            permits: Semaphore::new(max_in_flight.max(1)),
        }
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .context("The request limiter was closed")
            .pub_result(ErrorType::Backend)
    }

    async fn access_token(&self) -> Result<String> {
        self.token_provider.lock().await.token_with_refresh().await
    }

    /// Creates a `sheets` client with a refreshed access token.
    async fn sheets_client(&self) -> Result<sheets::Client> {
        let access_token = self.access_token().await?;

        // The sheets crate wants OAuth client details too, but API calls only need the token.
        Ok(sheets::Client::new(
            String::new(),
            String::new(),
            String::new(),
            access_token,
            String::new(),
        ))
    }

    async fn worksheets(&self, table: &TableRef) -> Result<Vec<SheetProperties>> {
        let url = sheets_url(&["spreadsheets", &table.id])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(self.access_token().await?)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await
            .context("Failed to send the spreadsheet metadata request")?;
        let meta: SpreadsheetMeta = parse(response, "Spreadsheet metadata").await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn read_range(&self, table_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let response = self
            .sheets_client()
            .await?
            .spreadsheets()
            .values_get(
                table_id,
                range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch {range}"))?;
        Ok(response.body.values)
    }
}

#[async_trait::async_trait]
impl TableBackend for GoogleBackend {
    async fn open_table(&self, name: &str) -> Result<TableRef> {
        trace!("open_table {name}");
        let _permit = self.permit().await?;
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'")
        );
        let response = self
            .http
            .get(DRIVE_FILES_API)
            .bearer_auth(self.access_token().await?)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await
            .context("Failed to send the Drive search request")?;
        let list: FileList = parse(response, "Drive search").await?;
        if list.files.len() > 1 {
            warn!(
                "{} spreadsheets are named '{name}', using the first one",
                list.files.len()
            );
        }
        let file = list.files.into_iter().next().ok_or_else(|| {
            Error::msg(ErrorType::TableNotFound, format!("Table '{name}' not found"))
        })?;
        Ok(TableRef {
            id: file.id,
            name: file.name,
        })
    }

    async fn open_worksheet(&self, table: &TableRef, title: &str) -> Result<WorksheetRef> {
        trace!("open_worksheet {}/{title}", table.name);
        let _permit = self.permit().await?;
        self.worksheets(table)
            .await?
            .into_iter()
            .find(|p| p.title == title)
            .map(|p| WorksheetRef {
                table_id: table.id.clone(),
                sheet_id: p.sheet_id,
                title: p.title,
            })
            .ok_or_else(|| {
                Error::msg(
                    ErrorType::WorksheetNotFound,
                    format!("Worksheet '{title}' not found in '{}'", table.name),
                )
            })
    }

    async fn duplicate_worksheet(
        &self,
        worksheet: &WorksheetRef,
        target: &TableRef,
    ) -> Result<i64> {
        trace!("duplicate_worksheet {} -> {}", worksheet.title, target.name);
        let _permit = self.permit().await?;
        let url = sheets_url(&[
            "spreadsheets",
            &worksheet.table_id,
            "sheets",
            &format!("{}:copyTo", worksheet.sheet_id),
        ])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token().await?)
            .json(&json!({ "destinationSpreadsheetId": target.id }))
            .send()
            .await
            .context("Failed to send the worksheet copy request")?;
        let copy: SheetProperties = parse(response, "Worksheet copy").await?;
        Ok(copy.sheet_id)
    }

    async fn resolve_worksheet(&self, table: &TableRef, sheet_id: i64) -> Result<WorksheetRef> {
        let _permit = self.permit().await?;
        self.worksheets(table)
            .await?
            .into_iter()
            .find(|p| p.sheet_id == sheet_id)
            .map(|p| WorksheetRef {
                table_id: table.id.clone(),
                sheet_id: p.sheet_id,
                title: p.title,
            })
            .ok_or_else(|| {
                Error::msg(
                    ErrorType::WorksheetNotFound,
                    format!("No worksheet with id {sheet_id} in '{}'", table.name),
                )
            })
    }

    async fn update_cells(&self, worksheet: &WorksheetRef, cells: &[CellUpdate]) -> Result<()> {
        trace!("update_cells {} ({} cells)", worksheet.title, cells.len());
        let _permit = self.permit().await?;
        let title = quote_title(&worksheet.title);
        let value_ranges: Vec<ValueRange> = cells
            .iter()
            .map(|c| ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: format!("{title}!{}", c.cell),
                values: vec![vec![c.value.clone()]],
            })
            .collect();

        let request = BatchUpdateValuesRequest {
            data: value_ranges,
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };

        self.sheets_client()
            .await?
            .spreadsheets()
            .values_batch_update(&worksheet.table_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write cells of '{}'", worksheet.title))?;
        Ok(())
    }

    async fn update_title(&self, worksheet: &WorksheetRef, title: &str) -> Result<WorksheetRef> {
        trace!("update_title {} -> {title}", worksheet.title);
        let _permit = self.permit().await?;
        let url = sheets_url(&[
            "spreadsheets",
            &format!("{}:batchUpdate", worksheet.table_id),
        ])?;
        let body = json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": { "sheetId": worksheet.sheet_id, "title": title },
                    "fields": "title"
                }
            }]
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token().await?)
            .json(&body)
            .send()
            .await
            .context("Failed to send the rename request")?;
        let _: serde_json::Value = parse(response, "Worksheet rename").await?;
        Ok(WorksheetRef {
            table_id: worksheet.table_id.clone(),
            sheet_id: worksheet.sheet_id,
            title: title.to_string(),
        })
    }

    async fn append_row(&self, worksheet: &WorksheetRef, values: &[String]) -> Result<()> {
        trace!("append_row {}", worksheet.title);
        let _permit = self.permit().await?;
        let range = format!("{}!A1", quote_title(&worksheet.title));
        let mut url = sheets_url(&[
            "spreadsheets",
            &worksheet.table_id,
            "values",
            &format!("{range}:append"),
        ])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token().await?)
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await
            .context("Failed to send the append request")?;
        let _: serde_json::Value = parse(response, "Row append").await?;
        Ok(())
    }

    async fn read_all_rows(&self, worksheet: &WorksheetRef) -> Result<Vec<Record>> {
        trace!("read_all_rows {}", worksheet.title);
        let _permit = self.permit().await?;
        let range = format!("{}!A:ZZ", quote_title(&worksheet.title));
        let rows = self.read_range(&worksheet.table_id, &range).await?;
        Ok(records(&rows))
    }

    async fn read_cell(&self, worksheet: &WorksheetRef, cell: CellRef) -> Result<String> {
        trace!("read_cell {}!{cell}", worksheet.title);
        let _permit = self.permit().await?;
        let range = format!("{}!{cell}", quote_title(&worksheet.title));
        let rows = self.read_range(&worksheet.table_id, &range).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }
}

/// Builds a Sheets API URL, percent-encoding each path segment.
fn sheets_url(segments: &[&str]) -> anyhow::Result<Url> {
    let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API base URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("The Sheets API base URL cannot have path segments"))?
        .extend(segments);
    Ok(url)
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        return Err(anyhow!("{what} failed with status {status}: {body}").into());
    }
    let value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse the {what} response"))?;
    Ok(value)
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheets_url_encodes_segments() {
        let range = format!("{}!A1", quote_title("Общие траты"));
        let url = sheets_url(&["spreadsheets", "abc", "values", &format!("{range}:append")])
            .unwrap();
        assert!(url
            .as_str()
            .starts_with("https://sheets.googleapis.com/v4/spreadsheets/abc/values/"));
        assert!(url.as_str().ends_with("!A1:append"));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn test_sheet_properties_deserialize() {
        let meta: SpreadsheetMeta = serde_json::from_str(
            r#"{"sheets":[{"properties":{"sheetId":0,"title":"Шаблон"}},
                {"properties":{"sheetId":17,"title":"Общие траты"}}]}"#,
        )
        .unwrap();
        assert_eq!(meta.sheets.len(), 2);
        assert_eq!(meta.sheets[1].properties.sheet_id, 17);
        assert_eq!(meta.sheets[1].properties.title, "Общие траты");
    }
}
