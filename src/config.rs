//! Configuration file handling for gig-ledger.
//!
//! The configuration file is stored at `$GIG_LEDGER_HOME/config.json` and contains the table
//! layout (the `Schema`), the request limit for the Google backend, the help link and the
//! authentication file paths.

use crate::error::{ErrorType, IntoResult};
use crate::model::{FilterKey, Schema};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "gig-ledger";
const CONFIG_VERSION: u8 = 1;
const MAX_IN_FLIGHT: usize = 15;
const HELP_URL: &str = "https://github.com/IvanRukan/aiogram-tg-finance-bot";
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const ARTISTS_TXT: &str = "artists.txt";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$GIG_LEDGER_HOME` and from there it loads `$GIG_LEDGER_HOME/config.json`. It
/// provides paths to other items that are either configurable or are expected in a certain
/// location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its subdirectories and:
    /// - Creates an initial `config.json` with the default schema for `filter_key`
    /// - Moves `secret_file`, if given, into its default location in the home directory
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the home directory, e.g. `$HOME/gig-ledger`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
    ///   OAuth workflow. Not needed when the bot only ever runs against the in-memory backend.
    /// - `filter_key` - Whether event worksheets are keyed by date or by venue.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_file: Option<&Path>,
        filter_key: FilterKey,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the gig-ledger home directory")
            .pub_result(ErrorType::Io)?;
        let root = utils::canonicalize(&maybe_relative)
            .await
            .pub_result(ErrorType::Io)?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir)
            .await
            .pub_result(ErrorType::Io)?;

        if let Some(secret_file) = secret_file {
            let secret_destination = secrets_dir.join(CLIENT_SECRET_JSON);
            utils::rename(secret_file, secret_destination)
                .await
                .pub_result(ErrorType::Io)?;
        }

        let schema = match filter_key {
            FilterKey::Date => Schema::date_keyed(),
            FilterKey::Venue => Schema::venue_keyed(),
        };
        let config_file = ConfigFile {
            schema,
            ..ConfigFile::default()
        };
        let config_path = root.join(CONFIG_JSON);
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load the config file and validate its schema
    /// - validate that the secrets directory exists
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The gig-ledger home directory is missing. Run `gig-ledger init` first")
            .pub_result(ErrorType::Config)?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            return Err(anyhow::anyhow!(
                "The config file is missing '{}'",
                config_path.display()
            ))
            .pub_result(ErrorType::Config);
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            return Err(anyhow::anyhow!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            ))
            .pub_result(ErrorType::Config);
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The artist registry file.
    pub fn artists_path(&self) -> PathBuf {
        self.root.join(ARTISTS_TXT)
    }

    pub fn schema(&self) -> &Schema {
        &self.config_file.schema
    }

    pub fn max_in_flight(&self) -> usize {
        self.config_file.max_in_flight
    }

    pub fn help_url(&self) -> &str {
        &self.config_file.help_url
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative path.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration (categories shortened):
/// ```json
/// {
///   "app_name": "gig-ledger",
///   "config_version": 1,
///   "schema": {
///     "filter_key": "date",
///     "template_table": "Бот шаблон",
///     "template_sheet": "Шаблон",
///     "ledger_sheet": "Общие траты",
///     "title_cell": "A1",
///     "ledger_range": "A2:C600",
///     "columns": { "date": "Дата", "amount": "Сумма", "category": "Категория",
///                  "spender": "Кто потратил", "comment": "Комментарий" },
///     "categories": [ { "name": "Еда", "cell": "B15" } ]
///   },
///   "max_in_flight": 15,
///   "help_url": "https://github.com/IvanRukan/aiogram-tg-finance-bot",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "gig-ledger"
    app_name: String,

    config_version: u8,

    /// Layout of the template, event and ledger worksheets.
    schema: Schema,

    /// Upper bound on concurrent requests to Google.
    #[serde(default = "default_max_in_flight")]
    max_in_flight: usize,

    /// Where `/помощь` points users.
    #[serde(default = "default_help_url")]
    help_url: String,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to config.json or absolute)
    /// Defaults to $GIG_LEDGER_HOME/.secrets/client_secret.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to config.json or absolute)
    /// Defaults to $GIG_LEDGER_HOME/.secrets/token.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_max_in_flight() -> usize {
    MAX_IN_FLIGHT
}

fn default_help_url() -> String {
    HELP_URL.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            schema: Schema::default(),
            max_in_flight: MAX_IN_FLIGHT,
            help_url: HELP_URL.to_string(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await.pub_result(ErrorType::Io)?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
            .pub_result(ErrorType::Config)?;
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))
            .pub_result(ErrorType::Config)?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.app_name != APP_NAME {
            bail!(
                "Invalid app_name in config file: expected '{APP_NAME}', got '{}'",
                self.app_name
            );
        }
        if self.config_version != CONFIG_VERSION {
            bail!(
                "Unsupported config_version {}, expected {CONFIG_VERSION}",
                self.config_version
            );
        }
        anyhow::ensure!(self.max_in_flight > 0, "max_in_flight must be at least 1");
        self.schema.validate()
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self)
            .context("Unable to serialize config")
            .pub_result(ErrorType::Config)?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
            .pub_result(ErrorType::Io)
    }

    /// If the path is relative, it is interpreted as relative to the home directory.
    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    /// If the path is relative, it is interpreted as relative to the home directory.
    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("gig_ledger_home");
        let secret_source_file = dir.path().join("x.txt");
        let secret_content = "12345";
        utils::write(&secret_source_file, secret_content)
            .await
            .unwrap();

        let config = Config::create(&home_dir, Some(&secret_source_file), FilterKey::Date)
            .await
            .unwrap();

        let found_secret_content = utils::read(&config.client_secret_path()).await.unwrap();
        assert_eq!(secret_content, found_secret_content);
        assert!(config.secrets().is_dir());
        assert!(config.config_path().is_file());
        assert_eq!(config.artists_path(), config.root().join("artists.txt"));
        assert_eq!(config.max_in_flight(), 15);
        assert_eq!(config.schema().filter_key, FilterKey::Date);
    }

    #[tokio::test]
    async fn test_config_create_then_load_venue() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), None, FilterKey::Venue)
            .await
            .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.schema(), &Schema::venue_keyed());
        assert_eq!(config.token_path(), config.secrets().join("token.json"));
        assert!(config.help_url().starts_with("https://"));
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(err.is(ErrorType::Config));

        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(err.is(ErrorType::Config));
        assert!(err.to_string().contains("config file is missing"));
    }

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.max_in_flight, 15);
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON)
        );
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = ConfigFile {
            max_in_flight: 4,
            client_secret_path: Some(PathBuf::from("/etc/gig-ledger/key.json")),
            token_path: Some(PathBuf::from(".secrets/my_token.json")),
            ..ConfigFile::default()
        };
        original_config.save(&config_path).await.unwrap();
        let loaded_config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(original_config, loaded_config);
    }

    #[tokio::test]
    async fn test_config_file_load_minimal_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let schema = serde_json::to_string(&Schema::date_keyed()).unwrap();
        let json = format!(
            r#"{{ "app_name": "gig-ledger", "config_version": 1, "schema": {schema} }}"#
        );
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.max_in_flight, MAX_IN_FLIGHT);
        assert_eq!(config.help_url, HELP_URL);
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let config = ConfigFile {
            app_name: "wrong_app".to_string(),
            ..ConfigFile::default()
        };
        config.save(&config_path).await.unwrap();

        let err = ConfigFile::load(&config_path).await.unwrap_err();
        assert!(err.is(ErrorType::Config));
        assert!(format!("{err:#}").contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_schema() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let mut schema = Schema::date_keyed();
        schema.categories.clear();
        let config = ConfigFile {
            schema,
            ..ConfigFile::default()
        };
        config.save(&config_path).await.unwrap();

        let err = ConfigFile::load(&config_path).await.unwrap_err();
        assert!(err.is(ErrorType::Config));
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("client_secret_path"));
        assert!(!json.contains("token_path"));
    }
}
