//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `gig-ledger auth` - Initial OAuth consent flow
//! - `gig-ledger auth --verify` - Verify the saved token against the template table

use crate::commands::Out;
use crate::engine::EventProvisioner;
use crate::{api, Config, Mode, Result};
use tracing::info;

/// Handles the `gig-ledger auth` command - runs the OAuth consent flow.
///
/// Prints the consent URL, reads the authorization code pasted back by the user and saves the
/// tokens to token.json.
///
/// # Errors
/// Returns an error if the OAuth flow fails or if client_secret.json is missing
pub async fn auth(config: &Config) -> Result<Out<()>> {
    api::authorize(config).await?;
    Ok(format!("Saved the OAuth token to {}", config.token_path().display()).into())
}

/// Handles the `gig-ledger auth --verify` command.
///
/// This command never starts the consent flow. It loads the saved token, refreshing it if needed,
/// opens the template table and checks its ledger header against config.json.
///
/// # Errors
/// Returns an error if the token is missing or invalid, or if the template does not match.
pub async fn auth_verify(config: &Config, mode: Mode) -> Result<Out<()>> {
    let backend = api::backend(config, mode).await.map_err(|e| {
        e.context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'gig-ledger auth' (without the --verify flag).",
        )
    })?;
    EventProvisioner::new(backend, config.schema().clone())
        .verify_template()
        .await?;
    info!("Your OAuth token is valid!");
    Ok("The template table is reachable and matches the configuration".into())
}
