//! The operations behind both the bot and the CLI: provisioning event worksheets and working
//! with an artist's expense ledger. Everything here talks to a `dyn TableBackend`.

mod ledger;
mod provision;

pub use ledger::{Binding, ExpenseLedger, Summary};
pub use provision::{EventProvisioner, ProvisionReport};
