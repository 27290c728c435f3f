//! The declarative layout of the template: which worksheets exist, where the title goes, which
//! columns the ledger has, and which cell of an event worksheet totals which category.
//!
//! The two known layouts differ only in how event worksheets are keyed (by date or by venue) and
//! in their category sets, so both are expressed as data here rather than as separate code paths.

use crate::model::CellRef;
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which ledger column an event worksheet's formulas filter on.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    /// One event worksheet per date; formulas match the ledger's date column.
    #[default]
    Date,
    /// One event worksheet per venue; formulas match the ledger's venue column.
    Venue,
}

serde_plain::derive_display_from_serialize!(FilterKey);
serde_plain::derive_fromstr_from_deserialize!(FilterKey);

/// Binds a category to the event worksheet cell that totals it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CategoryCell {
    pub name: String,
    pub cell: CellRef,
}

impl CategoryCell {
    pub fn new(name: impl Into<String>, cell: CellRef) -> Self {
        Self {
            name: name.into(),
            cell,
        }
    }
}

/// The header names of the ledger worksheet. `read_all_rows` keys each row by these.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LedgerColumns {
    pub date: String,
    pub amount: String,
    pub category: String,
    pub spender: String,
    pub comment: String,
    /// Only present in the venue-keyed layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

impl LedgerColumns {
    /// Header cells in the order they appear in the ledger worksheet, starting at `A1`.
    pub fn headers(&self) -> Vec<&str> {
        let mut headers = vec![
            self.date.as_str(),
            self.amount.as_str(),
            self.category.as_str(),
            self.spender.as_str(),
            self.comment.as_str(),
        ];
        if let Some(venue) = &self.venue {
            headers.push(venue.as_str());
        }
        headers
    }
}

/// The whole template layout.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub filter_key: FilterKey,
    /// Name of the table that holds the template worksheets.
    pub template_table: String,
    /// Title of the worksheet duplicated once per event.
    pub template_sheet: String,
    /// Canonical title of the ledger worksheet, both in the template and in artist tables.
    pub ledger_sheet: String,
    /// Where an event worksheet shows its composite title.
    pub title_cell: CellRef,
    /// The ledger range that category formulas aggregate over, e.g. `A2:C600`.
    pub ledger_range: String,
    pub columns: LedgerColumns,
    pub categories: Vec<CategoryCell>,
}

const TEMPLATE_TABLE: &str = "Бот шаблон";
const TEMPLATE_SHEET: &str = "Шаблон";
const LEDGER_SHEET: &str = "Общие траты";

/// Categories shared by both layouts, with their cells in the template.
const COMMON_CATEGORIES: &[(&str, u32)] = &[
    ("Технический довоз", 5),
    ("Аренда площадки", 6),
    ("Персонал", 7),
    ("Гостиница", 13),
    ("Бытовой райдер", 14),
    ("Еда", 15),
    ("Суточные", 16),
    ("Билеты", 22),
    ("Транспорт", 23),
    ("Такси", 24),
    ("Багаж", 25),
    ("Доп. место", 26),
];

/// Extra categories of the venue-keyed layout.
const VENUE_CATEGORIES: &[(&str, u32)] = &[("Дизайн", 8), ("Реклама", 9), ("ФОТ", 10)];

/// All category totals live in column B of the template.
const TOTALS_COL: u32 = 2;

impl Default for Schema {
    fn default() -> Self {
        Self::date_keyed()
    }
}

impl Schema {
    /// One event worksheet per date, formulas filter on the ledger's date column.
    pub fn date_keyed() -> Self {
        Self {
            filter_key: FilterKey::Date,
            template_table: TEMPLATE_TABLE.to_string(),
            template_sheet: TEMPLATE_SHEET.to_string(),
            ledger_sheet: LEDGER_SHEET.to_string(),
            title_cell: CellRef::new(1, 1),
            ledger_range: "A2:C600".to_string(),
            columns: default_columns(None),
            categories: category_cells(COMMON_CATEGORIES.iter()),
        }
    }

    /// One event worksheet per venue, formulas filter on the ledger's venue column.
    pub fn venue_keyed() -> Self {
        let mut categories: Vec<(&str, u32)> = COMMON_CATEGORIES
            .iter()
            .chain(VENUE_CATEGORIES.iter())
            .copied()
            .collect();
        categories.sort_by_key(|(_, row)| *row);
        Self {
            filter_key: FilterKey::Venue,
            template_table: TEMPLATE_TABLE.to_string(),
            template_sheet: TEMPLATE_SHEET.to_string(),
            ledger_sheet: LEDGER_SHEET.to_string(),
            title_cell: CellRef::new(1, 1),
            ledger_range: "A2:F600".to_string(),
            columns: default_columns(Some("Город")),
            categories: category_cells(categories.iter()),
        }
    }

    /// Category names in table order.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Finds the category with exactly this name, ignoring surrounding whitespace.
    pub fn category(&self, name: &str) -> Option<&CategoryCell> {
        let name = name.trim();
        self.categories.iter().find(|c| c.name == name)
    }

    /// The ledger column letter that formulas filter on.
    pub fn filter_column(&self) -> &'static str {
        match self.filter_key {
            FilterKey::Date => "A",
            FilterKey::Venue => "F",
        }
    }

    /// Checks that the table is internally consistent. This runs once when the configuration is
    /// loaded; the template itself is checked by `EventProvisioner::verify_template`.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.categories.is_empty(), "The schema has no categories");
        ensure!(
            !self.template_table.trim().is_empty(),
            "The template table name is empty"
        );
        ensure!(
            self.template_sheet != self.ledger_sheet,
            "The template worksheet and the ledger worksheet must have different titles"
        );
        ensure!(
            (self.filter_key == FilterKey::Venue) == self.columns.venue.is_some(),
            "A venue column is required for, and only for, the venue-keyed layout"
        );

        let mut names = HashSet::new();
        let mut cells = HashSet::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() {
                bail!("A category has an empty name");
            }
            if name.contains(['\'', '"', ',']) {
                bail!("Category '{name}' contains a quote or a comma");
            }
            if !names.insert(name) {
                bail!("Category '{name}' appears more than once");
            }
            if category.cell == self.title_cell {
                bail!(
                    "Category '{name}' uses {} which is the title cell",
                    category.cell
                );
            }
            if !cells.insert(category.cell) {
                bail!("Cell {} is bound to more than one category", category.cell);
            }
        }
        Ok(())
    }
}

fn default_columns(venue: Option<&str>) -> LedgerColumns {
    LedgerColumns {
        date: "Дата".to_string(),
        amount: "Сумма".to_string(),
        category: "Категория".to_string(),
        spender: "Кто потратил".to_string(),
        comment: "Комментарий".to_string(),
        venue: venue.map(str::to_string),
    }
}

fn category_cells<'a>(items: impl Iterator<Item = &'a (&'a str, u32)>) -> Vec<CategoryCell> {
    items
        .map(|(name, row)| CategoryCell::new(*name, CellRef::new(*row, TOTALS_COL)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Schema::date_keyed().validate().unwrap();
        Schema::venue_keyed().validate().unwrap();
    }

    #[test]
    fn test_date_keyed_layout() {
        let schema = Schema::date_keyed();
        assert_eq!(schema.categories.len(), 12);
        assert_eq!(schema.category("Еда").unwrap().cell.a1(), "B15");
        assert_eq!(schema.category(" Доп. место ").unwrap().cell.a1(), "B26");
        assert!(schema.category("Дизайн").is_none());
        assert_eq!(schema.filter_column(), "A");
    }

    #[test]
    fn test_venue_keyed_layout_is_sorted_by_row() {
        let schema = Schema::venue_keyed();
        assert_eq!(schema.categories.len(), 15);
        let rows: Vec<u32> = schema.categories.iter().map(|c| c.cell.row()).collect();
        let mut sorted = rows.clone();
        sorted.sort();
        assert_eq!(rows, sorted);
        assert_eq!(schema.category("ФОТ").unwrap().cell.a1(), "B10");
        assert_eq!(schema.filter_column(), "F");
        assert_eq!(schema.columns.headers().len(), 6);
    }

    #[test]
    fn test_validate_duplicate_cell() {
        let mut schema = Schema::date_keyed();
        schema.categories[1].cell = schema.categories[0].cell;
        let err = schema.validate().unwrap_err().to_string();
        assert!(err.contains("more than one category"));
    }

    #[test]
    fn test_validate_duplicate_name() {
        let mut schema = Schema::date_keyed();
        schema.categories[1].name = schema.categories[0].name.clone();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_title_cell_collision() {
        let mut schema = Schema::date_keyed();
        schema.categories[0].cell = CellRef::new(1, 1);
        let err = schema.validate().unwrap_err().to_string();
        assert!(err.contains("title cell"));
    }

    #[test]
    fn test_validate_quote_in_name() {
        let mut schema = Schema::date_keyed();
        schema.categories[0].name = "Rock'n'roll".to_string();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_venue_column_mismatch() {
        let mut schema = Schema::date_keyed();
        schema.filter_key = FilterKey::Venue;
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_schema_json_roundtrip() {
        let schema = Schema::venue_keyed();
        let json = serde_json::to_string_pretty(&schema).unwrap();
        assert!(json.contains(r#""filter_key": "venue""#));
        assert!(json.contains(r#""cell": "B15""#));
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_filter_key_plain() {
        assert_eq!(FilterKey::Venue.to_string(), "venue");
        assert_eq!("date".parse::<FilterKey>().unwrap(), FilterKey::Date);
    }
}
