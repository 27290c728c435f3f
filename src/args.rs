//! These structs provide the CLI interface for the gig-ledger CLI.

use crate::model::FilterKey;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// gig-ledger: A Telegram bot and command-line tool for tour expense tables.
///
/// Every artist has a Google Sheets table with a ledger worksheet ("Общие траты") and one
/// summary worksheet per event. The bot lets a team create those event worksheets from a shared
/// template, record expenses in the ledger and view per-category totals for a period. The same
/// operations are available here as subcommands for operators and scripts.
///
/// You will need to set up a Google OAuth client for this and run `gig-ledger auth` once. Set
/// GIG_LEDGER_IN_TEST_MODE to any value to run everything against an in-memory table instead.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration file.
    ///
    /// This is the first command you should run. Choose whether event worksheets are keyed by
    /// date (the default) or by venue with --filter-key, and pass the OAuth client credentials
    /// you downloaded from the Google Cloud console with --client-secret. The layout of the
    /// template can be adjusted afterwards in config.json.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Run the Telegram bot until interrupted.
    Run(RunArgs),
    /// Create event worksheets in an artist's table, e.g. `HORUS,2025-05-22,2025-05-23`.
    Provision(ProvisionArgs),
    /// Add one expense to an artist's ledger, e.g. `22.05.2025,500,Еда,Кирилл,обед`.
    Append(AppendArgs),
    /// Print per-category totals of an artist's ledger for a period, e.g. `01.05.2025,31.05.2025`.
    Report(ReportArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration, the artist list and the OAuth files are held.
    /// Defaults to ~/gig-ledger
    #[arg(long, env = "GIG_LEDGER_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `gig-ledger init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// How event worksheets are keyed: "date" or "venue".
    #[arg(long, default_value_t = FilterKey::Date)]
    filter_key: FilterKey,

    /// The path to your downloaded OAuth client credentials. This file will be moved to the
    /// default secrets location in the home directory.
    #[arg(long)]
    client_secret: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(filter_key: FilterKey, client_secret: Option<PathBuf>) -> Self {
        Self {
            filter_key,
            client_secret,
        }
    }

    pub fn filter_key(&self) -> FilterKey {
        self.filter_key
    }

    pub fn client_secret(&self) -> Option<&Path> {
        self.client_secret.as_deref()
    }
}

/// (Not shown): Args for the `gig-ledger auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify the saved token and the template table instead of running the consent flow.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `gig-ledger run` command.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// The Telegram bot token issued by @BotFather.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: String,
}

impl RunArgs {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }
}

/// (Not shown): Args for the `gig-ledger provision` command.
#[derive(Debug, Parser, Clone)]
pub struct ProvisionArgs {
    /// The artist followed by the event dates, or by city:date pairs in the venue layout.
    payload: String,
}

impl ProvisionArgs {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// (Not shown): Args for the `gig-ledger append` command.
#[derive(Debug, Parser, Clone)]
pub struct AppendArgs {
    /// The artist whose ledger receives the expense.
    #[arg(long)]
    artist: String,

    /// date (or city),amount,category,spender[,comment]
    payload: String,
}

impl AppendArgs {
    pub fn new(artist: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            payload: payload.into(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// (Not shown): Args for the `gig-ledger report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// The artist whose ledger is totaled.
    #[arg(long)]
    artist: String,

    /// start,end with both dates inclusive, e.g. 22.05.2025,25.07.2026
    range: String,
}

impl ReportArgs {
    pub fn new(artist: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            range: range.into(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn range(&self) -> &str {
        &self.range
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("gig-ledger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or GIG_LEDGER_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("gig-ledger")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
