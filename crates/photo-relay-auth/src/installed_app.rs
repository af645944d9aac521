//! Interactive installed-application consent flow.
//!
//! The user opens the consent URL, approves access, and hands the resulting
//! authorization code back through a [`ConsentPrompt`]. Only the short-lived
//! access token is cached; refresh tokens are discarded.

use std::fmt;
use std::sync::Arc;

use photo_relay_core::now_ms;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::{
    AccessToken, AuthError, CredentialProvider, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI, TokenCache,
    TokenRequest, TokenTransport, token_from_response, validate_endpoint,
};

const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// OAuth client registration for an installed application.
#[derive(Clone, PartialEq, Eq)]
pub struct InstalledAppClient {
    /// Public client id.
    pub client_id: String,
    /// Client secret issued with the registration.
    pub client_secret: String,
    /// Redirect target registered for the client.
    pub redirect_uri: String,
    /// Consent page endpoint.
    pub auth_uri: String,
    /// Token endpoint.
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: ClientSecretsBody,
}

#[derive(Deserialize)]
struct ClientSecretsBody {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl InstalledAppClient {
    /// Creates a client with default endpoints and loopback redirect.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }

    /// Parses a downloaded `client_secrets.json` (`{"installed": {...}}`).
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidKey`] for malformed documents.
    pub fn from_client_secrets_json(raw: &str) -> Result<Self, AuthError> {
        let parsed: ClientSecretsFile = serde_json::from_str(raw)
            .map_err(|error| AuthError::InvalidKey(format!("client secrets json: {error}")))?;
        let body = parsed.installed;
        if body.client_id.trim().is_empty() {
            return Err(AuthError::InvalidKey("client_id is empty".to_string()));
        }

        let mut client = Self::new(body.client_id, body.client_secret);
        if let Some(auth_uri) = body.auth_uri {
            client.auth_uri = auth_uri;
        }
        if let Some(token_uri) = body.token_uri {
            client.token_uri = token_uri;
        }
        if let Some(redirect_uri) = body.redirect_uris.into_iter().next() {
            client.redirect_uri = redirect_uri;
        }
        Ok(client)
    }
}

impl fmt::Debug for InstalledAppClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledAppClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Collects the authorization code from the user.
pub trait ConsentPrompt: Send + Sync {
    /// Shows `consent_url` and returns the pasted authorization code.
    ///
    /// # Errors
    /// Returns [`AuthError::ConsentDeclined`] when the user aborts.
    fn authorization_code(&self, consent_url: &str) -> Result<String, AuthError>;
}

/// Credential provider running the installed-app consent flow on demand.
pub struct InstalledAppProvider {
    client: InstalledAppClient,
    scope: String,
    prompt: Arc<dyn ConsentPrompt>,
    transport: Arc<dyn TokenTransport>,
    cache: TokenCache,
    clock: fn() -> u64,
}

impl InstalledAppProvider {
    /// Creates a provider after validating both endpoints.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidEndpoint`] for insecure endpoints and
    /// [`AuthError::MissingCredential`] for a blank client id.
    pub fn new(
        client: InstalledAppClient,
        scope: impl Into<String>,
        prompt: Arc<dyn ConsentPrompt>,
        transport: Arc<dyn TokenTransport>,
    ) -> Result<Self, AuthError> {
        if client.client_id.trim().is_empty() {
            return Err(AuthError::MissingCredential(
                "installed app client_id is empty".to_string(),
            ));
        }
        validate_endpoint(&client.auth_uri)?;
        validate_endpoint(&client.token_uri)?;

        Ok(Self {
            client,
            scope: scope.into(),
            prompt,
            transport,
            cache: TokenCache::default(),
            clock: now_ms,
        })
    }

    /// Replaces the wall clock used for expiry bookkeeping.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the consent page URL the user must open.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidEndpoint`] when `auth_uri` is unparsable.
    pub fn consent_url(&self) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.client.auth_uri,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.client.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("access_type", "online"),
            ],
        )
        .map_err(|error| AuthError::InvalidEndpoint(format!("auth uri: {error}")))?;
        Ok(url.to_string())
    }
}

impl CredentialProvider for InstalledAppProvider {
    fn access_token(&self) -> Result<AccessToken, AuthError> {
        let now = (self.clock)();
        if let Some(token) = self.cache.fresh(now) {
            return Ok(token);
        }

        let consent_url = self.consent_url()?;
        let code = self.prompt.authorization_code(&consent_url)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::ConsentDeclined(
                "empty authorization code".to_string(),
            ));
        }

        let response = self.transport.exchange(&TokenRequest {
            endpoint: self.client.token_uri.clone(),
            form: vec![
                ("grant_type".to_string(), "authorization_code".to_string()),
                ("code".to_string(), code.to_string()),
                ("client_id".to_string(), self.client.client_id.clone()),
                ("client_secret".to_string(), self.client.client_secret.clone()),
                ("redirect_uri".to_string(), self.client.redirect_uri.clone()),
            ],
        })?;
        let token = token_from_response(response, now)?;

        info!(stage = "auth", action = "consent_granted", strategy = self.describe());
        self.cache.store(token.clone());
        Ok(token)
    }

    fn describe(&self) -> &'static str {
        "installed-app"
    }
}
