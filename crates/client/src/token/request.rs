//! Token exchange request types and validation.

use serde::{Deserialize, Serialize};

use crate::token::TokenError;

/// Body accepted by the relay: an authorization code and the redirect URI it was issued for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,
}

impl ExchangeRequest {
    /// Validate that both fields are present and non-empty.
    ///
    /// Returns the code and redirect URI on success.
    pub fn validate(&self) -> Result<(&str, &str), TokenError> {
        let code = self.code.as_deref().filter(|c| !c.is_empty()).ok_or(TokenError::MissingCode)?;
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or(TokenError::MissingRedirectUri)?;
        Ok((code, redirect_uri))
    }

    /// Form fields for the provider's token endpoint.
    pub(crate) fn form<'a>(
        code: &'a str, redirect_uri: &'a str, client_id: &'a str, client_secret: &'a str,
    ) -> [(&'static str, &'a str); 5] {
        [
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ]
    }
}
