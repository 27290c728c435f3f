use crate::commands::Out;
use crate::engine::{EventProvisioner, ProvisionReport};
use crate::error::{ErrorType, IntoResult};
use crate::model::EventRequest;
use crate::registry::ArtistRegistry;
use crate::{api, Config, Mode, Result};

/// Handles `gig-ledger provision`: the same as the bot's add-event step.
pub async fn provision(config: Config, mode: Mode, payload: &str) -> Result<Out<ProvisionReport>> {
    let schema = config.schema().clone();
    let request = EventRequest::parse(payload, schema.filter_key).pub_result(ErrorType::Validation)?;
    let backend = api::backend(&config, mode).await?;
    let report = EventProvisioner::new(backend, schema)
        .provision(&request)
        .await?;
    ArtistRegistry::new(config.artists_path())
        .register(&request.artist)
        .await?;
    Ok(Out::new(
        format!(
            "Created {} event worksheet(s) for {}",
            report.worksheets.len(),
            report.artist
        ),
        report,
    ))
}
