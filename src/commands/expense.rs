use crate::commands::Out;
use crate::engine::{ExpenseLedger, Summary};
use crate::error::{ErrorType, IntoResult};
use crate::model::{DateRange, LedgerRow};
use crate::{api, Config, Mode, Result};

/// Handles `gig-ledger append`: binds the artist's ledger and appends one expense.
pub async fn append(
    config: Config,
    mode: Mode,
    artist: &str,
    payload: &str,
) -> Result<Out<LedgerRow>> {
    let ledger = ledger(&config, mode).await?;
    let binding = ledger.bind(artist).await?;
    let row = ledger.append_payload(&binding, payload).await?;
    Ok(Out::new(
        format!("Added {} {} to the ledger of {artist}", row.category, row.amount),
        row,
    ))
}

/// Handles `gig-ledger report`: per-category totals for an inclusive date range.
pub async fn report(config: Config, mode: Mode, artist: &str, range: &str) -> Result<Out<Summary>> {
    let range = DateRange::parse(range).pub_result(ErrorType::Validation)?;
    let ledger = ledger(&config, mode).await?;
    let binding = ledger.bind(artist).await?;
    let summary = ledger.aggregate(&binding, range).await?;
    let mut message = format!("Expenses of {artist} from {} to {}", range.start(), range.end());
    for (category, sum) in summary.buckets() {
        message.push_str(&format!("\n  {category}: {sum}"));
    }
    message.push_str(&format!("\n  Total: {}", summary.total()));
    Ok(Out::new(message, summary))
}

async fn ledger(config: &Config, mode: Mode) -> Result<ExpenseLedger> {
    let backend = api::backend(config, mode).await?;
    Ok(ExpenseLedger::new(backend, config.schema().clone()))
}
