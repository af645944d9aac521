#![warn(missing_docs)]
//! # photo-relay-app
//!
//! ## Purpose
//! Wires camera capture, credentials, and the Drive uploader into the
//! single-button `photo-relay` application.
//!
//! ## Responsibilities
//! - Build the configured [`CredentialProvider`], upload client, and camera
//!   backend from [`AppConfig`].
//! - Run one capture-then-upload sequence per trigger press through
//!   [`PhotoRelay`], keeping the trigger disabled while it is in flight.
//! - Post status, progress, and result popups to the UI queue.
//! - Initialize structured logging and redact secrets from user-facing text.
//!
//! ## Data flow
//! Trigger press -> [`CaptureCoordinator::begin_capture`] -> worker thread
//! waits for the camera -> [`UploadCoordinator::upload`] fetches a token and
//! streams the file -> local copy removed -> UI queue receives the outcome.
//!
//! ## Ownership and lifetimes
//! Coordinators are built once at startup and shared with the worker thread
//! through `Arc`. The UI thread owns `UiState`; workers only hold a
//! [`photo_relay_ui::UiNotifier`].
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Startup errors abort the
//! process; sequence errors end in a popup and never escape the worker.
//!
//! ## Security and privacy notes
//! - Messages shown to the user pass through [`redact_sensitive`].
//! - Photos are deleted locally once an upload attempt finishes.

pub mod config;
pub mod coordinator;

use std::sync::Arc;

use photo_relay_auth::{
    AuthError, ConsentPrompt, CredentialProvider, HttpTokenTransport, InstalledAppClient,
    InstalledAppProvider, ServiceAccountKey, ServiceAccountProvider, StaticTokenProvider,
    TokenTransport,
};
use photo_relay_capture::{
    CameraBackend, CaptureError, CommandCameraBackend, PhotoPathPolicy, SyntheticCameraBackend,
};
use photo_relay_core::CoreError;
use photo_relay_ui::UiNotifier;
use photo_relay_upload::{HttpDriveTransport, UploadClient, UploadError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use config::{
    AppConfig, CaptureSettings, ConfigError, CredentialConfig, DriveConfig, HttpConfig,
    MAX_CHUNK_KIB,
};
pub use coordinator::{
    CaptureCoordinator, PhotoRelay, RelayPhase, SequenceOutcome, UploadCoordinator, discard_photo,
};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("PHOTO_RELAY_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Installs the global `tracing` subscriber writing to stderr.
///
/// Honors `RUST_LOG`; defaults to `info`. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Redacts values that follow common secret markers.
///
/// A marker followed by `=` or `:` (or any `Bearer` prefix) keeps its name;
/// the value after it, up to whitespace, a quote, `,`, `&`, or `;`, becomes
/// `<redacted>`.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for marker in [
        "access_token",
        "client_secret",
        "assertion",
        "password",
        "token",
        "bearer",
        "authorization",
    ] {
        redacted = redact_marker(&redacted, marker);
    }
    redacted
}

fn redact_marker(input: &str, marker: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(marker) {
        let marker_end = cursor + found + marker.len();
        let separator: String = input[marker_end..]
            .chars()
            .take_while(|c| matches!(c, '=' | ':' | ' ' | '"'))
            .collect();
        let assigns = separator.contains(['=', ':']) || (marker == "bearer" && !separator.is_empty());
        if !assigns {
            output.push_str(&input[cursor..marker_end]);
            cursor = marker_end;
            continue;
        }

        let value_start = marker_end + separator.len();
        let value_end = input[value_start..]
            .find(|c: char| c.is_whitespace() || matches!(c, ',' | '"' | '&' | ';'))
            .map_or(input.len(), |offset| value_start + offset);

        output.push_str(&input[cursor..value_start]);
        if value_end > value_start {
            output.push_str("<redacted>");
        }
        cursor = value_end;
    }

    output.push_str(&input[cursor..]);
    output
}

/// Builds the credential provider selected by `config`.
///
/// # Errors
/// - [`AppError::Config`] when no strategy is configured or the installed-app
///   entry is incomplete.
/// - [`AppError::Auth`] for unreadable or invalid key material.
pub fn build_credential_provider(
    config: &AppConfig,
    prompt: Arc<dyn ConsentPrompt>,
) -> Result<Arc<dyn CredentialProvider>, AppError> {
    let scope = config.drive.scope.as_str();
    let http = &config.http;

    let provider: Arc<dyn CredentialProvider> = match &config.credential {
        CredentialConfig::Unconfigured => return Err(ConfigError::MissingCredential.into()),
        CredentialConfig::ServiceAccountFile { path } => {
            let key = ServiceAccountKey::from_file(path)?;
            Arc::new(ServiceAccountProvider::new(key, scope, token_transport(http)?)?)
        }
        CredentialConfig::ServiceAccountInline { json } => {
            let key = ServiceAccountKey::from_json(json)?;
            Arc::new(ServiceAccountProvider::new(key, scope, token_transport(http)?)?)
        }
        CredentialConfig::InstalledApp {
            client_secrets_file,
            client_id,
            client_secret,
        } => {
            let client = match (client_secrets_file, client_id, client_secret) {
                (Some(path), _, _) => {
                    let raw = std::fs::read_to_string(path).map_err(|error| {
                        AuthError::MissingCredential(format!("{}: {error}", path.display()))
                    })?;
                    InstalledAppClient::from_client_secrets_json(&raw)?
                }
                (None, Some(id), Some(secret)) => InstalledAppClient::new(id, secret),
                _ => return Err(ConfigError::IncompleteInstalledApp.into()),
            };
            Arc::new(InstalledAppProvider::new(
                client,
                scope,
                prompt,
                token_transport(http)?,
            )?)
        }
        CredentialConfig::AccessToken { token } => Arc::new(StaticTokenProvider::new(token.clone())?),
    };

    info!(stage = "startup", action = "credentials_ready", strategy = provider.describe());
    Ok(provider)
}

fn token_transport(http: &HttpConfig) -> Result<Arc<dyn TokenTransport>, AppError> {
    Ok(Arc::new(HttpTokenTransport::new(
        http.connect_timeout(),
        http.request_timeout(),
    )?))
}

/// Builds the Drive upload client for `config`.
///
/// # Errors
/// Returns [`AppError::Upload`] for an insecure endpoint or HTTP client
/// construction failure.
pub fn build_upload_client(config: &AppConfig) -> Result<UploadClient, AppError> {
    let transport = HttpDriveTransport::new(
        &config.drive.upload_base,
        config.http.connect_timeout(),
        config.http.request_timeout(),
    )?;
    Ok(UploadClient::new(Arc::new(transport), config.drive.upload_mode()))
}

/// Builds the camera backend; the synthetic camera stands in when no
/// command is configured.
///
/// # Errors
/// Returns [`AppError::Capture`] for an empty command line.
pub fn build_camera(settings: &CaptureSettings) -> Result<Arc<dyn CameraBackend>, AppError> {
    match &settings.camera_command {
        Some(command_line) => Ok(Arc::new(CommandCameraBackend::from_command_line(
            command_line,
        )?)),
        None => {
            warn!(
                stage = "startup",
                action = "synthetic_camera",
                "no camera command configured; photos will be placeholder images"
            );
            Ok(Arc::new(SyntheticCameraBackend::new()))
        }
    }
}

impl PhotoRelay {
    /// Builds the full relay from configuration.
    ///
    /// # Errors
    /// Propagates any builder failure; the application must not start
    /// without a credential provider.
    pub fn from_config(
        config: &AppConfig,
        notifier: UiNotifier,
        prompt: Arc<dyn ConsentPrompt>,
    ) -> Result<Self, AppError> {
        let credentials = build_credential_provider(config, prompt)?;
        let client = build_upload_client(config)?;
        let camera = build_camera(&config.capture)?;
        let paths = PhotoPathPolicy::discover(Some(&config.capture.app_dir));

        let capture = CaptureCoordinator::new(camera, paths);
        let upload = UploadCoordinator::new(
            credentials,
            client,
            config.drive.folder_id.clone(),
            Some(config.drive.description.clone()),
        );
        Ok(Self::new(capture, upload, notifier))
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Credential error raised while building a provider.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Camera error.
    #[error("camera error: {0}")]
    Capture(#[from] CaptureError),
    /// Upload error.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
    /// Photo record model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// A sequence is already in flight.
    #[error("a photo is already being taken or uploaded")]
    Busy,
    /// Worker thread failure.
    #[error("worker error: {0}")]
    Worker(String),
}
