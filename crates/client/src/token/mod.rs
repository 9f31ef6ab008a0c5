//! OAuth authorization-code exchange client.
//!
//! Trades a code obtained by the page for tokens at the provider, keeping the
//! client secret on the server side.
//!
//! ### Endpoint contract
//!
//! - **Endpoint**: `https://accounts.zoho.{region}/oauth/v2/token`
//! - **Body**: `application/x-www-form-urlencoded` with `grant_type=authorization_code`,
//!   `client_id`, `client_secret`, `redirect_uri`, `code`.
//! - **Normalization**: missing `refresh_token`/`scope` become empty strings,
//!   `expires_in` defaults to 3600 and `token_type` to `Bearer`.

pub mod error;
pub mod request;
pub mod response;

pub use error::TokenError;
pub use request::ExchangeRequest;
pub use response::{ProviderResponse, TokenGrant};

use reqwest::header;
use std::time::{Duration, Instant};
use swcache_core::AppConfig;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Token client configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Full token endpoint URL.
    pub token_url: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: "https://accounts.zoho.in/oauth/v2/token".to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: "swcache/0.1".to_string(),
        }
    }
}

impl From<&AppConfig> for TokenConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            client_id: config.relay.client_id.clone(),
            client_secret: config.relay.client_secret.clone(),
            token_url: config.relay.token_url(),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        }
    }
}

/// OAuth token-exchange client.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    config: TokenConfig,
}

impl TokenClient {
    /// Create a new token client with the given configuration.
    ///
    /// Missing credentials are reported per exchange, not here.
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { http, config })
    }

    fn credentials(&self) -> Result<(&str, &str), TokenError> {
        let id = self
            .config
            .client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::MissingCredentials("client_id".into()))?;
        let secret = self
            .config
            .client_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::MissingCredentials("client_secret".into()))?;
        Ok((id, secret))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Input is validated before credentials, so a page sending an empty body
    /// learns about its own mistake first.
    pub async fn exchange(&self, req: &ExchangeRequest) -> Result<TokenGrant, TokenError> {
        let (code, redirect_uri) = req.validate()?;
        let (client_id, client_secret) = self.credentials()?;

        let start = Instant::now();
        tracing::debug!(
            code_present = true,
            redirect_present = true,
            "exchanging authorization code at {}",
            self.config.token_url
        );

        let form = ExchangeRequest::form(code, redirect_uri, client_id, client_secret);
        let http_response = self
            .http
            .post(&self.config.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&form[..])
            .send()
            .await?;

        let status = http_response.status();
        let bytes = http_response.bytes().await?;
        let raw: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Parse(format!("status {}: {}", status, e)))?;
        let parsed: ProviderResponse =
            serde_json::from_value(raw.clone()).map_err(|e| TokenError::Parse(e.to_string()))?;

        if let Some(error) = parsed.error {
            tracing::warn!(%error, "token exchange rejected by provider");
            return Err(TokenError::Provider { error, description: parsed.error_description.unwrap_or_default(), raw });
        }

        tracing::debug!("token exchange completed in {:?}", start.elapsed());

        Ok(TokenGrant::from(parsed))
    }
}
