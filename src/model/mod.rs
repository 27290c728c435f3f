//! Types that represent the core data model, such as `LedgerRow` and `Schema`.
mod amount;
mod cell;
mod date;
mod event;
mod expense;
mod schema;

pub use amount::{Amount, AmountError};
pub use cell::CellRef;
pub use date::{DateRange, LedgerDate};
pub use event::{EventEntry, EventRequest};
pub use expense::{ExpenseInput, ExpenseKey, LedgerRow};
pub use schema::{CategoryCell, FilterKey, LedgerColumns, Schema};
