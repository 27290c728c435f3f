//! OAuth 2.0 authentication for the Google Sheets and Drive APIs.
//!
//! This module handles the complete OAuth workflow including:
//! - Loading OAuth credentials from client_secret.json
//! - Managing access and refresh tokens in token.json
//! - Running the consent flow, where the user pastes the redirect back into the terminal
//! - Refreshing the access token when it is about to expire

use crate::api::files::{SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::{anyhow, Context};
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the client credentials and the current token, refreshing it when needed.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: TokenFile,
}

impl TokenProvider {
    /// Loads both credential files. Fails with `ErrorType::Config` if either is missing.
    pub(crate) async fn load(secret_path: &Path, token_path: &Path) -> Result<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let token = TokenFile::load(token_path).await?;
        Ok(Self { secret, token })
    }

    /// Runs the consent flow and saves a fresh token file.
    ///
    /// 1. Prints the Google consent URL
    /// 2. The user approves access and the browser is redirected to `http://localhost`
    /// 3. The user pastes that address (or just the `code` parameter) into the terminal
    /// 4. The code is exchanged for access and refresh tokens, which are saved
    pub(crate) async fn initialize(secret_path: &Path, token_path: &Path) -> Result<Self> {
        info!("Starting OAuth consent flow");
        let secret = SecretFile::load(secret_path).await?;
        let client = client(&secret).pub_result(ErrorType::Config)?;
        let http = http_client()?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");
        for scope in OAUTH_SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, _csrf) = request.url();

        println!("Open this address in a browser and approve access:\n\n{auth_url}\n");
        println!(
            "The browser will then fail to load a page on {}. Paste that page's address here:",
            secret.redirect_uri()
        );

        let code = read_code().await?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http)
            .await
            .map_err(|e| anyhow!("Failed to exchange the authorization code: {e}"))
            .pub_result(ErrorType::Backend)?;

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .ok_or_else(|| anyhow!("Google did not return a refresh token"))
            .pub_result(ErrorType::Backend)?;
        let token = TokenFile::new(
            token_path.to_path_buf(),
            response.access_token().secret().to_string(),
            refresh_token,
            expires_at(&response),
        );
        token.save().await?;
        info!("Authorization successful, tokens saved to {}", token_path.display());

        Ok(Self { secret, token })
    }

    /// The current access token, which may be stale.
    pub(crate) fn token(&self) -> &str {
        self.token.access_token()
    }

    /// The current access token, refreshed and saved first if it expires within five minutes.
    pub(crate) async fn token_with_refresh(&mut self) -> Result<String> {
        if self.token.is_expired() {
            debug!("Refreshing the OAuth access token");
            let client = client(&self.secret).pub_result(ErrorType::Config)?;
            let http = http_client()?;
            let response = client
                .exchange_refresh_token(&RefreshToken::new(
                    self.token.refresh_token().to_string(),
                ))
                .request_async(&http)
                .await
                .map_err(|e| anyhow!("Failed to refresh the access token: {e}"))
                .pub_result(ErrorType::Backend)?;
            self.token.update(
                response.access_token().secret().to_string(),
                expires_at(&response),
                response.refresh_token().map(|t| t.secret().to_string()),
            );
            self.token.save().await?;
        }
        Ok(self.token().to_string())
    }
}

fn client(secret: &SecretFile) -> anyhow::Result<ConfiguredClient> {
    Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?)
        .set_redirect_uri(
            RedirectUrl::new(secret.redirect_uri().to_string()).context("Invalid redirect URI")?,
        ))
}

fn http_client() -> Result<oauth2::reqwest::Client> {
    oauth2::reqwest::ClientBuilder::new()
        // Following redirects opens the client to SSRF vulnerabilities.
        .redirect(oauth2::reqwest::redirect::Policy::none())
        .build()
        .context("Failed to build the OAuth HTTP client")
        .pub_result(ErrorType::Backend)
}

fn expires_at(response: &BasicTokenResponse) -> chrono::DateTime<Utc> {
    let seconds = response
        .expires_in()
        .map(|d| d.as_secs() as i64)
        .unwrap_or(3600);
    Utc::now() + chrono::Duration::seconds(seconds)
}

async fn read_code() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")
        .pub_result(ErrorType::Io)?;
    extract_code(&line).pub_result(ErrorType::Validation)
}

/// Accepts either the full redirect address or the bare code.
fn extract_code(pasted: &str) -> anyhow::Result<String> {
    let pasted = pasted.trim();
    anyhow::ensure!(!pasted.is_empty(), "Nothing was pasted");
    if !pasted.starts_with("http") {
        return Ok(pasted.to_string());
    }
    let url = url::Url::parse(pasted).context("The pasted address is not a valid URL")?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| anyhow!("The pasted address has no 'code' parameter"))
}
