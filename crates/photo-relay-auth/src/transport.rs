//! Token endpoint transport seam and its HTTP implementation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AuthError;

/// Form-encoded request sent to an OAuth token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Validated token endpoint URL.
    pub endpoint: String,
    /// Form fields in send order.
    pub form: Vec<(String, String)>,
}

impl TokenRequest {
    /// Returns the value of a form field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.form.iter().map(|(key, _)| key.as_str()).collect();
        f.debug_struct("TokenRequest")
            .field("endpoint", &self.endpoint)
            .field("form_keys", &keys)
            .finish()
    }
}

/// Successful token endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Abstract transport used by exchanging providers.
pub trait TokenTransport: Send + Sync {
    /// Posts the form and decodes a token response.
    ///
    /// # Errors
    /// Returns [`AuthError::Transport`] for network failures,
    /// [`AuthError::Rejected`] for non-success statuses and
    /// [`AuthError::InvalidResponse`] for undecodable bodies.
    fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError>;
}

/// Blocking `reqwest` implementation of [`TokenTransport`].
#[derive(Debug, Clone)]
pub struct HttpTokenTransport {
    client: reqwest::blocking::Client,
}

impl HttpTokenTransport {
    /// Builds a client with the given connect and request timeouts.
    ///
    /// # Errors
    /// Returns [`AuthError::Transport`] when the TLS backend fails to start.
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|error| AuthError::Transport(format!("http client init failed: {error}")))?;
        Ok(Self { client })
    }
}

impl TokenTransport for HttpTokenTransport {
    fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        debug!(stage = "auth", action = "token_exchange", endpoint = %request.endpoint);

        let response = self
            .client
            .post(&request.endpoint)
            .form(&request.form)
            .send()
            .map_err(|error| AuthError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| AuthError::Transport(format!("reading token response: {error}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error_description.or(parsed.error))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|error| AuthError::InvalidResponse(error.to_string()))
    }
}
