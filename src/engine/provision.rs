//! Creates event worksheets in an artist's table from the shared template.

use crate::api::{quote_title, CellUpdate, TableBackend, TableRef, WorksheetRef};
use crate::error::{Error, ErrorType};
use crate::model::{CategoryCell, CellRef, EventEntry, EventRequest, FilterKey, Schema};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What `provision` did.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ProvisionReport {
    pub artist: String,
    /// Whether the artist table had no ledger worksheet and one was copied from the template.
    pub ledger_created: bool,
    /// Titles of the event worksheets created, in request order.
    pub worksheets: Vec<String>,
}

/// Duplicates the template worksheet once per event entry and fills in its title and formulas.
pub struct EventProvisioner {
    backend: Arc<dyn TableBackend>,
    schema: Schema,
}

struct Template {
    event: WorksheetRef,
    ledger: WorksheetRef,
}

impl EventProvisioner {
    pub fn new(backend: Arc<dyn TableBackend>, schema: Schema) -> Self {
        Self { backend, schema }
    }

    /// Checks that the template table exists and that its ledger header matches the configured
    /// column names. Rows are keyed by header, so a mismatch would make every report empty.
    pub async fn verify_template(&self) -> Result<()> {
        let template = self.open_template().await?;
        let expected = self.schema.columns.headers();
        for (ix, name) in expected.iter().enumerate() {
            let cell = CellRef::new(1, ix as u32 + 1);
            let found = self.backend.read_cell(&template.ledger, cell).await?;
            if found.trim() != *name {
                return Err(Error::msg(
                    ErrorType::Config,
                    format!(
                        "The header of '{}' in '{}' has '{found}' in {cell}, expected '{name}'",
                        self.schema.ledger_sheet, self.schema.template_table
                    ),
                ));
            }
        }
        debug!("The template matches the schema");
        Ok(())
    }

    /// Creates one event worksheet per entry in the artist's table, copying the ledger worksheet
    /// first if the table has none.
    ///
    /// The artist table must already exist; otherwise this fails with `ErrorType::TableNotFound`.
    /// Nothing is rolled back when a step fails part way.
    pub async fn provision(&self, request: &EventRequest) -> Result<ProvisionReport> {
        let template = self.open_template().await?;
        let target = self
            .backend
            .open_table(&request.artist)
            .await
            .map_err(|e| e.context(format!("Unable to open the table of {}", request.artist)))?;

        let ledger_created = self.ensure_ledger(&template, &target).await?;

        let mut worksheets = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let title = self
                .create_event_sheet(&template, &target, &request.artist, entry)
                .await
                .map_err(|e| e.context(format!("Failed to create the worksheet {}", entry.label())))?;
            worksheets.push(title);
        }

        info!(
            "Provisioned {} event worksheet(s) for {}",
            worksheets.len(),
            request.artist
        );
        Ok(ProvisionReport {
            artist: request.artist.clone(),
            ledger_created,
            worksheets,
        })
    }

    async fn open_template(&self) -> Result<Template> {
        let table = self
            .backend
            .open_table(&self.schema.template_table)
            .await
            .map_err(template_error)?;
        let event = self
            .backend
            .open_worksheet(&table, &self.schema.template_sheet)
            .await
            .map_err(template_error)?;
        let ledger = self
            .backend
            .open_worksheet(&table, &self.schema.ledger_sheet)
            .await
            .map_err(template_error)?;
        Ok(Template { event, ledger })
    }

    async fn ensure_ledger(&self, template: &Template, target: &TableRef) -> Result<bool> {
        match self
            .backend
            .open_worksheet(target, &self.schema.ledger_sheet)
            .await
        {
            Ok(_) => Ok(false),
            Err(e) if e.is(ErrorType::WorksheetNotFound) => {
                debug!("Copying the ledger worksheet into {}", target.name);
                let id = self
                    .backend
                    .duplicate_worksheet(&template.ledger, target)
                    .await?;
                let copy = self.backend.resolve_worksheet(target, id).await?;
                self.backend
                    .update_title(&copy, &self.schema.ledger_sheet)
                    .await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_event_sheet(
        &self,
        template: &Template,
        target: &TableRef,
        artist: &str,
        entry: &EventEntry,
    ) -> Result<String> {
        let id = self
            .backend
            .duplicate_worksheet(&template.event, target)
            .await?;
        let sheet = self.backend.resolve_worksheet(target, id).await?;

        let mut cells = Vec::with_capacity(self.schema.categories.len() + 1);
        cells.push(CellUpdate::new(
            self.schema.title_cell,
            entry.composite_title(artist),
        ));
        for category in &self.schema.categories {
            cells.push(CellUpdate::new(
                category.cell,
                category_formula(&self.schema, category, entry),
            ));
        }
        self.backend.update_cells(&sheet, &cells).await?;

        let renamed = self.backend.update_title(&sheet, entry.label()).await?;
        debug!("Created event worksheet '{}' for {artist}", renamed.title);
        Ok(renamed.title)
    }
}

/// A missing template is a setup problem, not a missing artist table.
fn template_error(e: Error) -> Error {
    if e.is(ErrorType::TableNotFound) || e.is(ErrorType::WorksheetNotFound) {
        Error::new(ErrorType::Config, anyhow::anyhow!("The template is incomplete: {e}"))
    } else {
        e
    }
}

/// The formula that totals one category for one event, e.g.
/// `=IFERROR(SUM(QUERY('Общие траты'!A2:C600; "select B where A = date '2025-05-22' and C = 'Еда'")); 0)`
pub(crate) fn category_formula(schema: &Schema, category: &CategoryCell, entry: &EventEntry) -> String {
    let key = match (schema.filter_key, entry.venue()) {
        (FilterKey::Venue, Some(venue)) => format!("'{venue}'"),
        _ => format!("date '{}'", entry.date().query_literal()),
    };
    format!(
        "=IFERROR(SUM(QUERY({}!{}; \"select B where {} = {key} and C = '{}'\")); 0)",
        quote_title(&schema.ledger_sheet),
        schema.ledger_range,
        schema.filter_column(),
        category.name
    )
}
