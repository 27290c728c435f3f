//! Serialization and deserialization structures for Google OAuth credential files.
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the access and refresh tokens we receive after consent

use crate::api::OAUTH_SCOPES;
use crate::error::{ErrorType, IntoResult};
use crate::{utils, Result};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
const REDIRECT: &str = "http://localhost";

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console.
///
/// This file contains OAuth 2.0 Desktop Application credentials. The standard format from Google
/// has an "installed" wrapper around the actual credentials.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    /// Loads the OAuth client credentials from client_secret.json
    pub(crate) async fn load(path: &Path) -> Result<SecretFile> {
        utils::deserialize(path)
            .await
            .context("Unable to read the OAuth client secret file")
            .pub_result(ErrorType::Config)
    }

    pub(super) fn redirect_uri(&self) -> &str {
        self.installed.redirect_uris.value()
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct InstalledCredentials {
    client_id: String,
    client_secret: String,

    /// Must contain "http://localhost" (without a port number).
    redirect_uris: RedirectUris,

    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl RedirectUris {
    fn value(&self) -> &str {
        REDIRECT
    }
}

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| is_valid_redirect(s)) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the OAuth client for the bot, you must include '{REDIRECT}'"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

fn is_valid_redirect(s: &str) -> bool {
    s == REDIRECT || s == "http://127.0.0.1"
}

/// This is how we save the token information that we receive from Google OAuth. The path travels
/// with the data so that a refreshed token can be written back.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    #[serde(skip)]
    path: PathBuf,
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    id_token: Option<String>,
}

impl TokenFile {
    pub(super) async fn load(p: impl AsRef<Path>) -> Result<Self> {
        let path = p.as_ref();
        let mut token_file: Self = utils::deserialize(path)
            .await
            .context("Unable to deserialize the token JSON file. Run `gig-ledger auth` first")
            .pub_result(ErrorType::Config)?;
        token_file.validate_scopes().pub_result(ErrorType::Config)?;
        token_file.path = path.to_path_buf();
        Ok(token_file)
    }

    fn validate_scopes(&self) -> anyhow::Result<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing. Run `gig-ledger auth` again.");
            }
        }
        Ok(())
    }

    pub(super) fn new(
        path: impl Into<PathBuf>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            scopes: OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            access_token,
            refresh_token,
            expires_at,
            id_token: None,
        }
    }

    /// Writes the token to its path, readable only by the owner.
    pub(super) async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize the token to JSON")
            .pub_result(ErrorType::Io)?;
        utils::write(&self.path, json)
            .await
            .pub_result(ErrorType::Io)?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, Permissions::from_mode(0o600))
                .context("Failed to set file permissions")
                .pub_result(ErrorType::Io)?;
        }

        Ok(())
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(super) fn is_expired(&self) -> bool {
        let now = Utc::now();
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= now + buffer
    }

    /// Update the token with new values
    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SECRET: &str = r#"
{
    "installed": {
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": ["REDIRECT", "https://example.com:4040/whatever"],
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }
}
"#;

    async fn load_secret(redirect: &str) -> Result<SecretFile> {
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("client_secret.json");
        utils::write(&p, SECRET.replace("REDIRECT", redirect))
            .await
            .unwrap();
        SecretFile::load(&p).await
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let secret_file = load_secret("http://localhost").await.unwrap();
        assert_eq!("http://localhost", secret_file.redirect_uri());
        assert_eq!(
            "YOUR_CLIENT_ID.apps.googleusercontent.com",
            secret_file.client_id()
        );
        assert_eq!("https://oauth2.googleapis.com/token", secret_file.token_uri());
    }

    #[tokio::test]
    async fn test_client_secret_loopback_redirect() {
        let secret_file = load_secret("http://127.0.0.1").await.unwrap();
        assert_eq!("http://localhost", secret_file.redirect_uri());
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let parse_error = load_secret("http://localhost:9900").await.unwrap_err();
        assert!(parse_error.is(ErrorType::Config));
        let parse_error_message = format!("{parse_error:?}");
        assert!(parse_error_message
            .contains("At least one of the redirects needs to be http://localhost"));
    }

    #[tokio::test]
    async fn test_validate_token_file_missing_scope() {
        let json = r##"
        {
            "scopes": [
                "https://www.googleapis.com/auth/spreadsheets"
            ],
            "access_token":"abc12",
            "refresh_token":"xyz89",
            "expires_at":"2025-01-01T00:00:00Z",
            "id_token":null
        }
    "##;
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        utils::write(&json_path, json).await.unwrap();

        let error = TokenFile::load(&json_path).await.unwrap_err();
        assert!(error.is(ErrorType::Config));
        assert!(format!("{error:#}").contains("https://www.googleapis.com/auth/drive.readonly"));
    }

    #[tokio::test]
    async fn test_token_file_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let token = TokenFile::new(&json_path, "abc".into(), "xyz".into(), expires_at);
        token.save().await.unwrap();

        let mut loaded = TokenFile::load(&json_path).await.unwrap();
        assert_eq!(loaded.access_token(), "abc");
        assert_eq!(loaded.refresh_token(), "xyz");
        assert!(!loaded.is_expired());

        loaded.update("def".into(), Utc::now(), None);
        assert!(loaded.is_expired());
        assert_eq!(loaded.refresh_token(), "xyz");
    }
}
