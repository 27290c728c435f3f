//! Appends expenses to an artist's ledger worksheet and totals them by category.

use crate::api::{Record, TableBackend, TableRef, WorksheetRef};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{
    Amount, DateRange, ExpenseInput, ExpenseKey, LedgerDate, LedgerRow, Schema,
};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

/// An artist table and its ledger worksheet, opened once when the user picks the artist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Binding {
    table: TableRef,
    ledger: WorksheetRef,
}

impl Binding {
    pub fn artist(&self) -> &str {
        &self.table.name
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn ledger(&self) -> &WorksheetRef {
        &self.ledger
    }
}

/// Per-category totals in the order categories first appear in the ledger.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Summary {
    buckets: Vec<(String, Amount)>,
    total: Amount,
}

impl Summary {
    /// Fails without changing anything if the bucket or the grand total would overflow.
    fn add(&mut self, category: &str, amount: Amount) -> anyhow::Result<()> {
        let overflow = || anyhow::anyhow!("Adding {amount} to '{category}' overflows the total");
        let total = self.total.checked_add(amount).ok_or_else(overflow)?;
        match self.buckets.iter_mut().find(|(c, _)| c == category) {
            Some((_, sum)) => *sum = sum.checked_add(amount).ok_or_else(overflow)?,
            None => self.buckets.push((category.to_string(), amount)),
        }
        self.total = total;
        Ok(())
    }

    pub fn buckets(&self) -> &[(String, Amount)] {
        &self.buckets
    }

    pub fn get(&self, category: &str) -> Option<Amount> {
        self.buckets
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, a)| *a)
    }

    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Reads and writes the ledger worksheet of a bound artist table.
pub struct ExpenseLedger {
    backend: Arc<dyn TableBackend>,
    schema: Schema,
}

impl ExpenseLedger {
    pub fn new(backend: Arc<dyn TableBackend>, schema: Schema) -> Self {
        Self { backend, schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Opens the artist's table and its ledger worksheet.
    pub async fn bind(&self, artist: &str) -> Result<Binding> {
        let table = self.backend.open_table(artist).await?;
        let ledger = self
            .backend
            .open_worksheet(&table, &self.schema.ledger_sheet)
            .await?;
        debug!("Bound to the ledger of {artist}");
        Ok(Binding { table, ledger })
    }

    /// Parses a typed expense and appends it. See `append`.
    pub async fn append_payload(&self, binding: &Binding, payload: &str) -> Result<LedgerRow> {
        let input = ExpenseInput::parse(payload, &self.schema).pub_result(ErrorType::Validation)?;
        self.append(binding, input).await
    }

    /// Appends one row. In the venue-keyed layout the date is taken from the title cell of the
    /// venue's event worksheet, which must exist.
    pub async fn append(&self, binding: &Binding, input: ExpenseInput) -> Result<LedgerRow> {
        let date = match &input.key {
            ExpenseKey::Date(date) => *date,
            ExpenseKey::Venue(venue) => self.event_date(binding, venue).await?,
        };
        let row = LedgerRow::new(input, date);
        self.backend
            .append_row(&binding.ledger, &row.values())
            .await?;
        debug!(
            "Appended {} {} to the ledger of {}",
            row.category,
            row.amount,
            binding.artist()
        );
        Ok(row)
    }

    /// Totals, per category, the amounts of rows dated within `range`. A start after the end
    /// yields an empty summary. Any unreadable amount or date among the rows, or a sum that does
    /// not fit, fails the whole call with `ErrorType::DataFormat`.
    pub async fn aggregate(&self, binding: &Binding, range: DateRange) -> Result<Summary> {
        let records = self.backend.read_all_rows(&binding.ledger).await?;
        let columns = &self.schema.columns;
        let mut summary = Summary::default();
        for (ix, record) in records.iter().enumerate() {
            // Row 1 is the header.
            let row_number = ix + 2;
            let date = field(record, &columns.date);
            if date.is_empty() {
                trace!("Skipping row {row_number} without a date");
                continue;
            }
            let date = LedgerDate::parse(date).in_row(row_number)?;
            if !range.contains(date) {
                continue;
            }
            let amount = field(record, &columns.amount)
                .parse::<Amount>()
                .in_row(row_number)?;
            summary
                .add(field(record, &columns.category).trim(), amount)
                .in_row(row_number)?;
        }
        Ok(summary)
    }

    async fn event_date(&self, binding: &Binding, venue: &str) -> Result<LedgerDate> {
        let sheet = self.backend.open_worksheet(&binding.table, venue).await?;
        let title = self
            .backend
            .read_cell(&sheet, self.schema.title_cell)
            .await?;
        let token = title.split_whitespace().last().unwrap_or_default();
        LedgerDate::parse_event(token)
            .map_err(|e| {
                e.context(format!(
                    "The title '{title}' of worksheet '{venue}' does not end with a date"
                ))
            })
            .pub_result(ErrorType::DataFormat)
    }
}

fn field<'a>(record: &'a Record, name: &str) -> &'a str {
    record.get(name).map(String::as_str).unwrap_or_default()
}

/// Classifies a failure to read a stored row as `ErrorType::DataFormat`.
trait InRow<T> {
    fn in_row(self, row_number: usize) -> Result<T>;
}

impl<T, E> InRow<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn in_row(self, row_number: usize) -> Result<T> {
        self.map_err(|e| {
            Error::new(ErrorType::DataFormat, e).context(format!("Ledger row {row_number}"))
        })
    }
}
