#![warn(missing_docs)]
//! # photo-relay-auth
//!
//! ## Purpose
//! Implements the single pluggable credential capability used by the upload
//! coordinator.
//!
//! ## Responsibilities
//! - Define [`CredentialProvider`], the only auth seam the uploader sees.
//! - Provide the concrete strategies selected at startup: service-account key
//!   (file or inline JSON), installed-app consent flow, static bearer token.
//! - Exchange assertions and authorization codes through an injectable
//!   [`TokenTransport`].
//! - Validate token/consent endpoint policy (HTTPS, loopback allowed for tests).
//!
//! ## Data flow
//! Configuration -> one provider built at startup -> upload coordinator calls
//! [`CredentialProvider::access_token`] once per upload -> provider returns a
//! cached token or exchanges a fresh one via [`TokenTransport`].
//!
//! ## Ownership and lifetimes
//! Providers own their key material and are shared as
//! `Arc<dyn CredentialProvider>`; the key is loaded once and never mutated.
//! The only interior mutability is the token cache behind a `Mutex`.
//!
//! ## Error model
//! Missing/invalid material, signing failures, and exchange failures surface
//! as [`AuthError`]; the uploader maps them to a credential failure without
//! touching the network.
//!
//! ## Security and privacy notes
//! Token and private-key values never appear in `Debug` output or logs.
//!
//! ## Example
//! ```rust
//! use photo_relay_auth::{CredentialProvider, StaticTokenProvider};
//!
//! let provider = StaticTokenProvider::new("ya29.test").unwrap();
//! assert_eq!(provider.access_token().unwrap().secret(), "ya29.test");
//! ```

mod installed_app;
mod service_account;
mod transport;

use std::fmt;
use std::sync::Mutex;

use thiserror::Error;
use url::Url;

pub use installed_app::{ConsentPrompt, InstalledAppClient, InstalledAppProvider};
pub use service_account::{ServiceAccountKey, ServiceAccountProvider};
pub use transport::{HttpTokenTransport, TokenRequest, TokenResponse, TokenTransport};

/// Scope granting access only to files created by this application.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default OAuth consent endpoint for installed applications.
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Tokens are refreshed this long before their reported expiry.
pub const EXPIRY_SKEW_MS: u64 = 60_000;

/// Bearer token returned by a provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at_ms: Option<u64>,
}

impl AccessToken {
    /// Creates a token with an optional absolute expiry.
    pub fn new(secret: impl Into<String>, expires_at_ms: Option<u64>) -> Self {
        Self {
            secret: secret.into(),
            expires_at_ms,
        }
    }

    /// Raw bearer value for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Absolute expiry in epoch milliseconds, when known.
    pub fn expires_at_ms(&self) -> Option<u64> {
        self.expires_at_ms
    }

    /// Returns `true` when the token is within [`EXPIRY_SKEW_MS`] of expiry.
    pub fn needs_refresh(&self, now_ms: u64) -> bool {
        match self.expires_at_ms {
            Some(expires_at_ms) => now_ms.saturating_add(EXPIRY_SKEW_MS) >= expires_at_ms,
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Capability that yields API credentials for one upload.
pub trait CredentialProvider: Send + Sync {
    /// Returns a usable bearer token.
    ///
    /// # Errors
    /// Returns [`AuthError`] when no valid token can be produced.
    fn access_token(&self) -> Result<AccessToken, AuthError>;

    /// Short strategy label for logs.
    fn describe(&self) -> &'static str;
}

/// Provider that hands out one pre-issued bearer token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    /// Creates a provider around a non-empty token.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingCredential`] for a blank token.
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential(
                "static access token is empty".to_string(),
            ));
        }
        Ok(Self {
            token: AccessToken::new(token.trim(), None),
        })
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }

    fn describe(&self) -> &'static str {
        "static-token"
    }
}

/// In-memory token cache shared by the exchanging providers.
#[derive(Debug, Default)]
pub(crate) struct TokenCache {
    slot: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub(crate) fn fresh(&self, now_ms: u64) -> Option<AccessToken> {
        let slot = self.slot.lock().ok()?;
        slot.as_ref()
            .filter(|token| !token.needs_refresh(now_ms))
            .cloned()
    }

    pub(crate) fn store(&self, token: AccessToken) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(token);
        }
    }
}

/// Converts a token endpoint response into an [`AccessToken`].
pub(crate) fn token_from_response(
    response: TokenResponse,
    now_ms: u64,
) -> Result<AccessToken, AuthError> {
    if response.access_token.trim().is_empty() {
        return Err(AuthError::InvalidResponse(
            "token response missing access_token".to_string(),
        ));
    }
    if let Some(token_type) = &response.token_type
        && !token_type.eq_ignore_ascii_case("bearer")
    {
        return Err(AuthError::InvalidResponse(format!(
            "unsupported token type {token_type}"
        )));
    }

    let expires_at_ms = response
        .expires_in
        .map(|seconds| now_ms.saturating_add(seconds.saturating_mul(1_000)));
    Ok(AccessToken::new(response.access_token, expires_at_ms))
}

/// Validates an OAuth endpoint.
///
/// HTTPS is required; plain HTTP is accepted only for loopback hosts.
///
/// # Errors
/// Returns [`AuthError::InvalidEndpoint`] for unparsable or insecure URLs.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, AuthError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| AuthError::InvalidEndpoint(format!("invalid url {endpoint}: {error}")))?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if is_loopback(&parsed) => Ok(parsed),
        _ => Err(AuthError::InvalidEndpoint(format!(
            "endpoint must use https: {endpoint}"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

/// Errors produced while obtaining credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential material was configured or found.
    #[error("missing credential: {0}")]
    MissingCredential(String),
    /// Credential document could not be parsed or is incomplete.
    #[error("invalid credential material: {0}")]
    InvalidKey(String),
    /// Endpoint violates security policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Assertion could not be signed.
    #[error("assertion signing failed: {0}")]
    Signing(String),
    /// User did not complete the consent flow.
    #[error("consent was not granted: {0}")]
    ConsentDeclined(String),
    /// Network failure talking to the token endpoint.
    #[error("token transport failure: {0}")]
    Transport(String),
    /// Token endpoint refused the exchange.
    #[error("token endpoint rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided error description.
        message: String,
    },
    /// Token endpoint answered with an unusable payload.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}
