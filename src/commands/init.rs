use crate::commands::Out;
use crate::model::FilterKey;
use crate::{Config, Result};
use std::path::Path;
use tracing::warn;

/// Creates the home directory, its subdirectories and:
/// - Creates an initial `config.json` file with the default layout for `filter_key`
/// - Moves `secret_file`, if given, into its default location in the home directory.
///
/// # Arguments
/// - `home` - The directory that will be the root of the home directory, e.g. `$HOME/gig-ledger`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow.
/// - `filter_key` - Whether event worksheets are keyed by date or by venue.
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(
    home: &Path,
    secret_file: Option<&Path>,
    filter_key: FilterKey,
) -> Result<Out<()>> {
    let config = Config::create(home, secret_file, filter_key)
        .await
        .map_err(|e| e.context("Unable to create the home directory and config"))?;
    if secret_file.is_none() {
        warn!(
            "No --client-secret was given. Put your OAuth client file at {} before running \
            'gig-ledger auth'",
            config.client_secret_path().display()
        );
    }
    Ok(format!("Created the gig-ledger home at {}", config.root().display()).into())
}
