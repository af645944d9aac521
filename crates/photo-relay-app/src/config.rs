//! Startup configuration: optional JSON file plus `PHOTO_RELAY_*` overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use photo_relay_auth::DRIVE_FILE_SCOPE;
use photo_relay_core::DEFAULT_APP_DIR;
use photo_relay_upload::{DEFAULT_UPLOAD_BASE, UploadMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "PHOTO_RELAY_";

const DEFAULT_CHUNK_KIB: u32 = 1_024;

/// Largest accepted `chunk_kib` (64 MiB).
pub const MAX_CHUNK_KIB: u32 = 65_536;

/// Which credential strategy to build at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialConfig {
    /// Nothing configured; startup fails.
    #[default]
    Unconfigured,
    /// Service-account key file on disk.
    ServiceAccountFile {
        /// Key file path.
        path: PathBuf,
    },
    /// Service-account key embedded as JSON text.
    ServiceAccountInline {
        /// Key document.
        json: String,
    },
    /// Interactive installed-app consent.
    InstalledApp {
        /// Downloaded `client_secrets.json`, when used instead of inline ids.
        #[serde(default)]
        client_secrets_file: Option<PathBuf>,
        /// OAuth client id.
        #[serde(default)]
        client_id: Option<String>,
        /// OAuth client secret.
        #[serde(default)]
        client_secret: Option<String>,
    },
    /// Pre-issued bearer token.
    AccessToken {
        /// Token value.
        token: String,
    },
}

/// Remote storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveConfig {
    /// Parent folder for uploads; drive root when absent.
    pub folder_id: Option<String>,
    /// Description attached to every uploaded file.
    pub description: String,
    /// Upload endpoint root.
    pub upload_base: String,
    /// OAuth scope requested by service-account and consent flows.
    pub scope: String,
    /// Resumable chunk size in KiB; `0` selects single-request uploads.
    pub chunk_kib: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_id: None,
            description: "Uploaded by photo-relay".to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            scope: DRIVE_FILE_SCOPE.to_string(),
            chunk_kib: DEFAULT_CHUNK_KIB,
        }
    }
}

impl DriveConfig {
    /// Rejects a `chunk_kib` above [`MAX_CHUNK_KIB`].
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming `key`.
    fn check_chunk_kib(&self, key: &str) -> Result<(), ConfigError> {
        if self.chunk_kib > MAX_CHUNK_KIB {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: self.chunk_kib.to_string(),
            });
        }
        Ok(())
    }

    /// Transfer mode derived from `chunk_kib`.
    pub fn upload_mode(&self) -> UploadMode {
        match self.chunk_kib {
            0 => UploadMode::Simple,
            kib => UploadMode::resumable(kib as usize * 1_024),
        }
    }
}

/// Camera and storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSettings {
    /// External capture command line; synthetic camera when absent.
    pub camera_command: Option<String>,
    /// Application subdirectory under the storage roots.
    pub app_dir: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            camera_command: None,
            app_dir: DEFAULT_APP_DIR.to_string(),
        }
    }
}

/// HTTP client timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

impl HttpConfig {
    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Complete application configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Credential strategy.
    pub credential: CredentialConfig,
    /// Remote storage settings.
    pub drive: DriveConfig,
    /// Camera and storage settings.
    pub capture: CaptureSettings,
    /// HTTP timeouts.
    pub http: HttpConfig,
}

impl AppConfig {
    /// Parses configuration from JSON text.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for invalid JSON or unknown fields and
    /// [`ConfigError::InvalidValue`] for out-of-range values.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.drive.check_chunk_kib("drive.chunk_kib")?;
        Ok(config)
    }

    /// Loads the optional file, then applies process environment overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for unreadable/invalid files or bad overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `PHOTO_RELAY_*` overrides read through `lookup`.
    ///
    /// Credential variables are checked in a fixed order and the first one set
    /// wins: key file, inline key, static token.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(path) = read("SERVICE_ACCOUNT_FILE") {
            self.credential = CredentialConfig::ServiceAccountFile {
                path: PathBuf::from(path),
            };
        } else if let Some(json) = read("SERVICE_ACCOUNT_JSON") {
            self.credential = CredentialConfig::ServiceAccountInline { json };
        } else if let Some(token) = read("ACCESS_TOKEN") {
            self.credential = CredentialConfig::AccessToken { token };
        }

        if let Some(folder_id) = read("FOLDER_ID") {
            self.drive.folder_id = Some(folder_id);
        }
        if let Some(raw) = read("CHUNK_KIB") {
            let key = format!("{ENV_PREFIX}CHUNK_KIB");
            self.drive.chunk_kib = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.clone(),
                value: raw.clone(),
            })?;
            self.drive.check_chunk_kib(&key)?;
        }
        if let Some(command) = read("CAMERA_COMMAND") {
            self.capture.camera_command = Some(command);
        }
        if let Some(app_dir) = read("APP_DIR") {
            self.capture.app_dir = app_dir;
        }
        Ok(())
    }
}

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config JSON is invalid.
    #[error("invalid config: {0}")]
    Parse(serde_json::Error),
    /// An override value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
    /// No credential strategy was configured.
    #[error("no credential configured; set PHOTO_RELAY_SERVICE_ACCOUNT_FILE or a config file")]
    MissingCredential,
    /// Installed-app strategy lacks client id/secret.
    #[error("installed_app credential needs client_secrets_file or client_id and client_secret")]
    IncompleteInstalledApp,
}
