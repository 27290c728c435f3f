//! Implements the `TableBackend` trait using in-memory data.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets. It mirrors the Google behaviors the engine can
//! observe: worksheet titles are unique within a table, copies are named `Copy of ...`, and rows
//! are appended after the last non-empty row.

use crate::api::{records, CellUpdate, Record, TableBackend, TableRef, WorksheetRef};
use crate::error::{Error, ErrorType};
use crate::model::{CellRef, Schema};
use crate::Result;
use std::io::Cursor;
use tokio::sync::Mutex;
use tracing::trace;

/// An implementation of the `TableBackend` trait that holds every table in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    tables: Vec<MemTable>,
    next_sheet_id: i64,
}

#[derive(Debug, Clone)]
struct MemTable {
    id: String,
    name: String,
    sheets: Vec<MemSheet>,
}

#[derive(Debug, Clone)]
struct MemSheet {
    id: i64,
    title: String,
    rows: Vec<Vec<String>>,
}

impl MemSheet {
    fn set(&mut self, cell: CellRef, value: String) {
        let r = cell.row() as usize - 1;
        let c = cell.col() as usize - 1;
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let row = &mut self.rows[r];
        if row.len() <= c {
            row.resize(c + 1, String::new());
        }
        row[c] = value;
    }

    fn get(&self, cell: CellRef) -> String {
        self.rows
            .get(cell.row() as usize - 1)
            .and_then(|row| row.get(cell.col() as usize - 1))
            .cloned()
            .unwrap_or_default()
    }

    fn reference(&self, table_id: &str) -> WorksheetRef {
        WorksheetRef {
            table_id: table_id.to_string(),
            sheet_id: self.id,
            title: self.title.clone(),
        }
    }
}

impl State {
    fn table(&self, id: &str) -> Result<&MemTable> {
        self.tables
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::msg(ErrorType::TableNotFound, format!("No table with id {id}")))
    }

    fn table_mut(&mut self, id: &str) -> Result<&mut MemTable> {
        self.tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::msg(ErrorType::TableNotFound, format!("No table with id {id}")))
    }

    fn sheet_mut(&mut self, worksheet: &WorksheetRef) -> Result<&mut MemSheet> {
        self.table_mut(&worksheet.table_id)?
            .sheets
            .iter_mut()
            .find(|s| s.id == worksheet.sheet_id)
            .ok_or_else(|| missing_sheet_id(worksheet.sheet_id))
    }

    fn sheet(&self, worksheet: &WorksheetRef) -> Result<&MemSheet> {
        self.table(&worksheet.table_id)?
            .sheets
            .iter()
            .find(|s| s.id == worksheet.sheet_id)
            .ok_or_else(|| missing_sheet_id(worksheet.sheet_id))
    }

    fn allocate_sheet_id(&mut self) -> i64 {
        self.next_sheet_id += 1;
        self.next_sheet_id
    }
}

fn missing_sheet_id(id: i64) -> Error {
    Error::msg(
        ErrorType::WorksheetNotFound,
        format!("No worksheet with id {id}"),
    )
}

impl MemoryBackend {
    /// Creates a backend with no tables at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding only the template table laid out according to `schema`.
    pub fn with_template(schema: &Schema) -> Self {
        let mut state = State::default();
        let template = build_template(&mut state, schema);
        state.tables.push(template);
        Self {
            state: Mutex::new(state),
        }
    }

    /// Creates a backend holding the template table and a demo artist table with a few ledger
    /// rows. This is what `Mode::Testing` runs against.
    pub fn seeded(schema: &Schema) -> Self {
        let mut state = State::default();
        let template = build_template(&mut state, schema);
        state.tables.push(template);

        let demo_id = format!("table-{}", state.tables.len() + 1);
        let ledger_id = state.allocate_sheet_id();
        let mut rows = vec![header_row(schema)];
        for mut row in demo_rows() {
            if schema.columns.venue.is_some() {
                row.resize(5, String::new());
                row.push(DEMO_VENUE.to_string());
            }
            rows.push(row);
        }
        state.tables.push(MemTable {
            id: demo_id,
            name: DEMO_ARTIST.to_string(),
            sheets: vec![MemSheet {
                id: ledger_id,
                title: schema.ledger_sheet.clone(),
                rows,
            }],
        });

        Self {
            state: Mutex::new(state),
        }
    }

    /// Creates an empty table named `name`, like a user creating a spreadsheet by hand.
    pub async fn add_table(&self, name: &str) -> TableRef {
        let mut state = self.state.lock().await;
        let id = format!("table-{}", state.tables.len() + 1);
        state.tables.push(MemTable {
            id: id.clone(),
            name: name.to_string(),
            sheets: Vec::new(),
        });
        TableRef {
            id,
            name: name.to_string(),
        }
    }

    /// Adds a worksheet with the given rows to an existing table.
    pub async fn add_worksheet(
        &self,
        table: &TableRef,
        title: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<WorksheetRef> {
        let mut state = self.state.lock().await;
        let id = state.allocate_sheet_id();
        let t = state.table_mut(&table.id)?;
        let sheet = MemSheet {
            id,
            title: title.to_string(),
            rows,
        };
        let reference = sheet.reference(&t.id);
        t.sheets.push(sheet);
        Ok(reference)
    }

    /// Titles of every worksheet in the named table, in creation order.
    pub async fn worksheet_titles(&self, table: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.sheets.iter().map(|s| s.title.clone()).collect())
            .unwrap_or_default()
    }

    /// The raw rows of a worksheet, if it exists.
    pub async fn rows(&self, table: &str, title: &str) -> Option<Vec<Vec<String>>> {
        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .find(|t| t.name == table)
            .and_then(|t| t.sheets.iter().find(|s| s.title == title))
            .map(|s| s.rows.clone())
    }

    /// A single cell of a worksheet, if the worksheet exists.
    pub async fn cell(&self, table: &str, title: &str, cell: CellRef) -> Option<String> {
        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .find(|t| t.name == table)
            .and_then(|t| t.sheets.iter().find(|s| s.title == title))
            .map(|s| s.get(cell))
    }
}

#[async_trait::async_trait]
impl TableBackend for MemoryBackend {
    async fn open_table(&self, name: &str) -> Result<TableRef> {
        trace!("open_table {name}");
        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| TableRef {
                id: t.id.clone(),
                name: t.name.clone(),
            })
            .ok_or_else(|| {
                Error::msg(ErrorType::TableNotFound, format!("Table '{name}' not found"))
            })
    }

    async fn open_worksheet(&self, table: &TableRef, title: &str) -> Result<WorksheetRef> {
        trace!("open_worksheet {}/{title}", table.name);
        let state = self.state.lock().await;
        let t = state.table(&table.id)?;
        t.sheets
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.reference(&t.id))
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
        let mut state = self.state.lock().await;
        let source = state.sheet(worksheet)?.clone();
        let id = state.allocate_sheet_id();
        let t = state.table_mut(&target.id)?;
        let base = format!("Copy of {}", source.title);
        let mut title = base.clone();
        let mut n = 1;
        while t.sheets.iter().any(|s| s.title == title) {
            n += 1;
            title = format!("{base} {n}");
        }
        t.sheets.push(MemSheet {
            id,
            title,
            rows: source.rows,
        });
        Ok(id)
    }

    async fn resolve_worksheet(&self, table: &TableRef, sheet_id: i64) -> Result<WorksheetRef> {
        let state = self.state.lock().await;
        let t = state.table(&table.id)?;
        t.sheets
            .iter()
            .find(|s| s.id == sheet_id)
            .map(|s| s.reference(&t.id))
            .ok_or_else(|| missing_sheet_id(sheet_id))
    }

    async fn update_cells(&self, worksheet: &WorksheetRef, cells: &[CellUpdate]) -> Result<()> {
        trace!("update_cells {} ({} cells)", worksheet.title, cells.len());
        let mut state = self.state.lock().await;
        let sheet = state.sheet_mut(worksheet)?;
        for update in cells {
            sheet.set(update.cell, update.value.clone());
        }
        Ok(())
    }

    async fn update_title(&self, worksheet: &WorksheetRef, title: &str) -> Result<WorksheetRef> {
        trace!("update_title {} -> {title}", worksheet.title);
        let mut state = self.state.lock().await;
        let t = state.table_mut(&worksheet.table_id)?;
        if t
            .sheets
            .iter()
            .any(|s| s.title == title && s.id != worksheet.sheet_id)
        {
            return Err(Error::msg(
                ErrorType::Backend,
                format!("A sheet with the name \"{title}\" already exists"),
            ));
        }
        let table_id = t.id.clone();
        let sheet = t
            .sheets
            .iter_mut()
            .find(|s| s.id == worksheet.sheet_id)
            .ok_or_else(|| missing_sheet_id(worksheet.sheet_id))?;
        sheet.title = title.to_string();
        Ok(sheet.reference(&table_id))
    }

    async fn append_row(&self, worksheet: &WorksheetRef, values: &[String]) -> Result<()> {
        trace!("append_row {}", worksheet.title);
        let mut state = self.state.lock().await;
        let sheet = state.sheet_mut(worksheet)?;
        let last = sheet
            .rows
            .iter()
            .rposition(|row| row.iter().any(|v| !v.is_empty()))
            .map(|ix| ix + 1)
            .unwrap_or(0);
        sheet.rows.truncate(last);
        sheet.rows.push(values.to_vec());
        Ok(())
    }

    async fn read_all_rows(&self, worksheet: &WorksheetRef) -> Result<Vec<Record>> {
        trace!("read_all_rows {}", worksheet.title);
        let state = self.state.lock().await;
        let sheet = state.sheet(worksheet)?;
        Ok(records(&sheet.rows))
    }

    async fn read_cell(&self, worksheet: &WorksheetRef, cell: CellRef) -> Result<String> {
        trace!("read_cell {}!{cell}", worksheet.title);
        let state = self.state.lock().await;
        Ok(state.sheet(worksheet)?.get(cell))
    }
}

const DEMO_ARTIST: &str = "HORUS";
const DEMO_VENUE: &str = "Москва";

fn header_row(schema: &Schema) -> Vec<String> {
    schema
        .columns
        .headers()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Lays out the template table: an event worksheet with category labels next to their total
/// cells, and an empty ledger with its header row.
fn build_template(state: &mut State, schema: &Schema) -> MemTable {
    let template_id = state.allocate_sheet_id();
    let mut template = MemSheet {
        id: template_id,
        title: schema.template_sheet.clone(),
        rows: Vec::new(),
    };
    template.set(schema.title_cell, "АРТИСТ ДАТА".to_string());
    for category in &schema.categories {
        if category.cell.col() > 1 {
            let label = CellRef::new(category.cell.row(), category.cell.col() - 1);
            template.set(label, category.name.clone());
        }
        template.set(category.cell, "0".to_string());
    }

    let ledger_id = state.allocate_sheet_id();
    let ledger = MemSheet {
        id: ledger_id,
        title: schema.ledger_sheet.clone(),
        rows: vec![header_row(schema)],
    };

    MemTable {
        id: format!("table-{}", state.tables.len() + 1),
        name: schema.template_table.clone(),
        sheets: vec![template, ledger],
    }
}

/// Demo ledger rows for the seeded artist.
fn demo_rows() -> Vec<Vec<String>> {
    // The data is a compile-time constant, so a parse failure would only drop demo rows.
    load_csv(DEMO_LEDGER_DATA).unwrap_or_default()
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed ledger data for the demo artist.
const DEMO_LEDGER_DATA: &str = r##"22-05-2025,500,Еда,Кирилл,
22-05-2025,1 200,Такси,Кирилл,аэропорт - отель
23-05-2025,300,Еда,Кирилл,
23-05-2025,4 500,Гостиница,Аня,две ночи
"##;

/// Parses a CSV string into rows, for tests that want to seed a ledger.
#[cfg(test)]
pub(crate) fn csv_rows(csv_data: &str) -> Vec<Vec<String>> {
    load_csv(csv_data).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_template_layout() {
        let schema = Schema::date_keyed();
        let backend = MemoryBackend::seeded(&schema);
        assert_eq!(
            backend.worksheet_titles("Бот шаблон").await,
            vec!["Шаблон", "Общие траты"]
        );
        let label = backend
            .cell("Бот шаблон", "Шаблон", CellRef::new(15, 1))
            .await
            .unwrap();
        assert_eq!(label, "Еда");
        let header = backend.rows("Бот шаблон", "Общие траты").await.unwrap();
        assert_eq!(header[0][0], "Дата");
    }

    #[tokio::test]
    async fn test_seeded_demo_artist() {
        let backend = MemoryBackend::seeded(&Schema::venue_keyed());
        let rows = backend.rows("HORUS", "Общие траты").await.unwrap();
        assert_eq!(rows[0].len(), 6);
        assert_eq!(rows[1][5], "Москва");
        assert!(MemoryBackend::with_template(&Schema::date_keyed())
            .open_table("HORUS")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_open_missing_table_and_worksheet() {
        let backend = MemoryBackend::new();
        let err = backend.open_table("nope").await.unwrap_err();
        assert!(err.is(ErrorType::TableNotFound));

        let table = backend.add_table("HORUS").await;
        let err = backend.open_worksheet(&table, "nope").await.unwrap_err();
        assert!(err.is(ErrorType::WorksheetNotFound));
    }

    #[tokio::test]
    async fn test_duplicate_names_copies_uniquely() {
        let backend = MemoryBackend::new();
        let source = backend.add_table("src").await;
        let target = backend.add_table("dst").await;
        let sheet = backend
            .add_worksheet(&source, "Шаблон", csv_rows("a,b\n"))
            .await
            .unwrap();

        let first = backend.duplicate_worksheet(&sheet, &target).await.unwrap();
        let second = backend.duplicate_worksheet(&sheet, &target).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(
            backend.worksheet_titles("dst").await,
            vec!["Copy of Шаблон", "Copy of Шаблон 2"]
        );
        let copy = backend.resolve_worksheet(&target, second).await.unwrap();
        assert_eq!(copy.title, "Copy of Шаблон 2");
        assert_eq!(backend.read_cell(&copy, CellRef::new(1, 2)).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_update_title_rejects_duplicates() {
        let backend = MemoryBackend::new();
        let table = backend.add_table("t").await;
        let a = backend.add_worksheet(&table, "a", Vec::new()).await.unwrap();
        let _b = backend.add_worksheet(&table, "b", Vec::new()).await.unwrap();
        assert!(backend.update_title(&a, "b").await.is_err());
        let renamed = backend.update_title(&a, "c").await.unwrap();
        assert_eq!(renamed.title, "c");
        assert!(backend.open_worksheet(&table, "c").await.is_ok());
    }

    #[tokio::test]
    async fn test_append_after_last_non_empty_row() {
        let backend = MemoryBackend::new();
        let table = backend.add_table("t").await;
        let rows = vec![
            vec!["h1".to_string(), "h2".to_string()],
            vec!["1".to_string(), "2".to_string()],
            vec![String::new(), String::new()],
        ];
        let sheet = backend.add_worksheet(&table, "s", rows).await.unwrap();
        backend
            .append_row(&sheet, &["3".to_string()])
            .await
            .unwrap();
        let records = backend.read_all_rows(&sheet).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["h1"], "3");
        assert_eq!(records[1]["h2"], "");
    }

    #[tokio::test]
    async fn test_update_cells_grows_grid() {
        let backend = MemoryBackend::new();
        let table = backend.add_table("t").await;
        let sheet = backend.add_worksheet(&table, "s", Vec::new()).await.unwrap();
        backend
            .update_cells(&sheet, &[CellUpdate::new(CellRef::new(3, 4), "x")])
            .await
            .unwrap();
        assert_eq!(backend.read_cell(&sheet, CellRef::new(3, 4)).await.unwrap(), "x");
        assert_eq!(backend.read_cell(&sheet, CellRef::new(9, 9)).await.unwrap(), "");
    }

    #[test]
    fn test_demo_rows_parse() {
        let rows = demo_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1][1], "1 200");
        assert_eq!(rows[0][4], "");
    }
}
