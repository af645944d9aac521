//! Service-account key loading and JWT-bearer token exchange.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use photo_relay_core::now_ms;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AccessToken, AuthError, CredentialProvider, DEFAULT_TOKEN_URI, TokenCache, TokenRequest,
    TokenTransport, token_from_response, validate_endpoint,
};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: u64 = 3_600;

/// Service-account key document as issued by the cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Document type; must be `service_account`.
    #[serde(rename = "type")]
    pub key_type: String,
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Key id forwarded as the JWT `kid` header.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Service-account identity.
    pub client_email: String,
    /// Token endpoint; defaults to [`DEFAULT_TOKEN_URI`].
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parses and validates a key from inline JSON.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidKey`] for malformed or incomplete documents.
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let key: Self = serde_json::from_str(raw)
            .map_err(|error| AuthError::InvalidKey(format!("service account json: {error}")))?;
        key.validate()?;
        Ok(key)
    }

    /// Reads and validates a key file.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingCredential`] when the file cannot be read,
    /// otherwise the errors of [`ServiceAccountKey::from_json`].
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            AuthError::MissingCredential(format!(
                "service account file {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Effective token endpoint.
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.key_type != "service_account" {
            return Err(AuthError::InvalidKey(format!(
                "expected type service_account, got {}",
                self.key_type
            )));
        }
        if self.client_email.trim().is_empty() {
            return Err(AuthError::InvalidKey("client_email is empty".to_string()));
        }
        if !self.private_key.contains("PRIVATE KEY") {
            return Err(AuthError::InvalidKey(
                "private_key is not a PEM private key".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Credential provider backed by a service-account key.
///
/// Signs an RS256 assertion per exchange and caches the resulting token until
/// it is close to expiry.
pub struct ServiceAccountProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token_uri: String,
    scope: String,
    transport: Arc<dyn TokenTransport>,
    cache: TokenCache,
    clock: fn() -> u64,
}

impl ServiceAccountProvider {
    /// Creates a provider; the key is parsed once here.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidKey`] when the PEM cannot be loaded and
    /// [`AuthError::InvalidEndpoint`] when the key's token URI is insecure.
    pub fn new(
        key: ServiceAccountKey,
        scope: impl Into<String>,
        transport: Arc<dyn TokenTransport>,
    ) -> Result<Self, AuthError> {
        let token_uri = validate_endpoint(key.token_uri())?.to_string();
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|error| AuthError::InvalidKey(format!("private_key: {error}")))?;

        Ok(Self {
            key,
            encoding_key,
            token_uri,
            scope: scope.into(),
            transport,
            cache: TokenCache::default(),
            clock: now_ms,
        })
    }

    /// Replaces the wall clock used for assertion timestamps and expiry.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Service-account identity used as the assertion issuer.
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signs the JWT-bearer assertion for `now_ms`.
    ///
    /// # Errors
    /// Returns [`AuthError::Signing`] when signing fails.
    pub fn signed_assertion(&self, now_ms: u64) -> Result<String, AuthError> {
        let iat = now_ms / 1_000;
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECONDS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|error| AuthError::Signing(error.to_string()))
    }
}

impl CredentialProvider for ServiceAccountProvider {
    fn access_token(&self) -> Result<AccessToken, AuthError> {
        let now = (self.clock)();
        if let Some(token) = self.cache.fresh(now) {
            return Ok(token);
        }

        let assertion = self.signed_assertion(now)?;
        let response = self.transport.exchange(&TokenRequest {
            endpoint: self.token_uri.clone(),
            form: vec![
                ("grant_type".to_string(), JWT_BEARER_GRANT.to_string()),
                ("assertion".to_string(), assertion),
            ],
        })?;
        let token = token_from_response(response, now)?;

        info!(
            stage = "auth",
            action = "token_issued",
            strategy = self.describe(),
            client = %self.key.client_email,
        );
        self.cache.store(token.clone());
        Ok(token)
    }

    fn describe(&self) -> &'static str {
        "service-account"
    }
}
