use crate::bot::Controller;
use crate::commands::Out;
use crate::engine::EventProvisioner;
use crate::error::{ErrorType, IntoResult};
use crate::registry::ArtistRegistry;
use crate::{api, bot, Config, Mode, Result};
use std::sync::Arc;
use tracing::info;

/// Handles the `gig-ledger run` command: checks the template once, then serves Telegram
/// conversations until the process is stopped.
pub async fn run(config: Config, mode: Mode, bot_token: &str) -> Result<Out<()>> {
    let backend = api::backend(&config, mode).await?;
    let schema = config.schema().clone();
    EventProvisioner::new(backend.clone(), schema.clone())
        .verify_template()
        .await?;

    let registry = ArtistRegistry::new(config.artists_path());
    info!(
        "Known artists: {}",
        registry.read().await?.join(", ")
    );
    let controller = Arc::new(Controller::new(
        backend,
        schema,
        registry,
        config.help_url(),
    ));
    bot::run(bot_token, controller)
        .await
        .pub_result(ErrorType::Backend)?;
    Ok("The bot has stopped".into())
}
