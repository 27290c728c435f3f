//! gig-ledger: event worksheets and expense ledgers for touring artists, kept in Google Sheets
//! and driven from a Telegram bot or the command line.

pub mod api;
pub mod args;
pub mod bot;
pub mod commands;
mod config;
pub mod engine;
mod error;
pub mod model;
mod registry;
mod utils;

pub use api::Mode;
pub use config::Config;
pub use error::{Error, ErrorType, IntoResult, Result};
pub use registry::ArtistRegistry;
