//! OAuth2 credential lifecycle
//!
//! Builds, upgrades, and refreshes provider credentials. Uses synchronous
//! HTTP (ureq) to be executor-agnostic. The manager never retries; retry
//! and backoff policy belong to the caller.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use ureq::Agent;

use crate::config::{self, GmailCredentials};
use crate::error::{Error, Result};
use crate::models::Credential;

/// Credential filename in the config directory
const TOKEN_FILE: &str = "gmail-tokens.json";

/// Refresh when a credential is within this many seconds of expiry
const REFRESH_BUFFER_SECS: i64 = 300;

/// Raw token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Outcome of a one-time authorization-code upgrade.
///
/// `captured_at` is stamped at the moment the response was received, so the
/// absolute expiry can be computed from the provider's relative `expires_in`
/// without trusting the provider's clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExchange {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    /// Seconds since the Unix epoch at response receipt
    pub captured_at: i64,
}

/// Constructs and refreshes provider credentials
pub struct CredentialManager {
    client_id: String,
    client_secret: String,
    token_url: String,
    token_path: Option<PathBuf>,
    agent: Agent,
}

impl CredentialManager {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Required scope for mailbox access (read + label changes)
    const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Create a new manager for the given OAuth application
    pub fn new(credentials: GmailCredentials) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .new_agent();

        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            token_url: Self::TOKEN_URL.to_string(),
            token_path: config::config_path(TOKEN_FILE),
            agent,
        }
    }

    /// Override the token endpoint (tests, self-hosted proxies)
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Override where credentials are persisted
    pub fn with_token_path(mut self, path: PathBuf) -> Self {
        self.token_path = Some(path);
        self
    }

    /// Build the consent URL a user must visit to authorize this client
    pub fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(Self::GMAIL_MODIFY_SCOPE),
        )
    }

    /// Exchange a one-time authorization code for a durable token pair.
    ///
    /// A single form-encoded POST against the token endpoint. Transport
    /// failures become [`Error::UpstreamUnreachable`]; any non-success
    /// status becomes [`Error::UpstreamRejected`] carrying the raw body.
    pub fn upgrade_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenExchange> {
        let mut response = self.agent.post(&self.token_url).send_form([
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])?;

        if !response.status().is_success() {
            return Err(Error::UpstreamRejected {
                status: response.status().as_u16(),
                body: response.body_mut().read_to_string().unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.body_mut().read_json()?;
        Ok(TokenExchange {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(0),
            captured_at: Utc::now().timestamp(),
        })
    }

    /// Build a credential from an upgrade response.
    ///
    /// Pure: `expires_at = captured_at + expires_in`, independent of any
    /// clock skew against the provider.
    pub fn credential_from_upgrade_response(exchange: &TokenExchange) -> Credential {
        Credential::new(
            exchange.access_token.clone(),
            exchange.refresh_token.clone().unwrap_or_default(),
            exchange.captured_at + exchange.expires_in,
        )
    }

    /// Silently refresh an access token using the stored refresh token.
    ///
    /// The provider may omit the refresh token from its response; the
    /// existing one is carried forward in that case.
    pub fn refresh(&self, credential: &Credential) -> Result<Credential> {
        if !credential.is_usable() {
            return Err(Error::MissingCredential("refresh requires a token pair"));
        }

        let mut response = self.agent.post(&self.token_url).send_form([
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", credential.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])?;

        if !response.status().is_success() {
            return Err(Error::UpstreamRejected {
                status: response.status().as_u16(),
                body: response.body_mut().read_to_string().unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.body_mut().read_json()?;
        let captured_at = Utc::now().timestamp();
        Ok(Credential::new(
            token.access_token,
            token
                .refresh_token
                .unwrap_or_else(|| credential.refresh_token.clone()),
            captured_at + token.expires_in.unwrap_or(0),
        ))
    }

    /// Return the credential unchanged while comfortably valid, else refresh
    pub fn ensure_fresh(&self, credential: &Credential) -> Result<Credential> {
        if !credential.is_usable() {
            return Err(Error::MissingCredential("credential has no token pair"));
        }
        if credential.seconds_until_expiry(Utc::now().timestamp()) > REFRESH_BUFFER_SECS {
            return Ok(credential.clone());
        }
        log::debug!("access token near expiry, refreshing");
        self.refresh(credential)
    }

    /// Load the persisted credential, if any
    pub fn load_credential(&self) -> anyhow::Result<Credential> {
        let path = self
            .token_path
            .as_ref()
            .context("Could not determine token storage path")?;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file: {}", path.display()))?;
        let credential: Credential = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token file: {}", path.display()))?;
        Ok(credential)
    }

    /// Persist a credential for later sessions
    pub fn save_credential(&self, credential: &Credential) -> anyhow::Result<()> {
        let path = self
            .token_path
            .as_ref()
            .context("Could not determine token storage path")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(credential)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write token file: {}", path.display()))?;
        Ok(())
    }
}
