//! Integration tests for configuration loading and startup wiring.

use std::sync::Arc;

use photo_relay_app::{
    AppConfig, AppError, ConfigError, CredentialConfig, build_camera, build_credential_provider,
    build_upload_client,
};
use photo_relay_auth::{AuthError, ConsentPrompt};
use photo_relay_upload::UploadMode;

const SERVICE_ACCOUNT_FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../photo-relay-auth/tests/fixtures/service_account.json"
);

struct DecliningPrompt;

impl ConsentPrompt for DecliningPrompt {
    fn authorization_code(&self, _consent_url: &str) -> Result<String, AuthError> {
        Err(AuthError::ConsentDeclined("test prompt".to_string()))
    }
}

fn prompt() -> Arc<dyn ConsentPrompt> {
    Arc::new(DecliningPrompt)
}

#[test]
fn startup_wiring_tests_loads_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("relay.json");
    std::fs::write(
        &path,
        format!(
            r#"{{
                "credential": {{"kind": "service_account_file", "path": "{SERVICE_ACCOUNT_FIXTURE}"}},
                "drive": {{"folder_id": "folder-9", "chunk_kib": 0}},
                "capture": {{"app_dir": "PhotoUploader"}}
            }}"#
        ),
    )
    .expect("config fixture");

    let config = AppConfig::from_json(&std::fs::read_to_string(&path).expect("read back"))
        .expect("config parses");

    assert_eq!(config.drive.folder_id.as_deref(), Some("folder-9"));
    assert_eq!(config.drive.upload_mode(), UploadMode::Simple);
    assert_eq!(config.capture.app_dir, "PhotoUploader");
    assert!(matches!(
        config.credential,
        CredentialConfig::ServiceAccountFile { .. }
    ));
}

#[test]
fn startup_wiring_tests_unreadable_config_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = AppConfig::load(Some(dir.path().join("absent.json").as_path()));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn startup_wiring_tests_builds_service_account_provider_from_file() {
    let config = AppConfig {
        credential: CredentialConfig::ServiceAccountFile {
            path: SERVICE_ACCOUNT_FIXTURE.into(),
        },
        ..AppConfig::default()
    };

    let provider = build_credential_provider(&config, prompt()).expect("provider builds");
    assert_eq!(provider.describe(), "service-account");
}

#[test]
fn startup_wiring_tests_missing_key_file_blocks_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig {
        credential: CredentialConfig::ServiceAccountFile {
            path: dir.path().join("missing.json"),
        },
        ..AppConfig::default()
    };

    let result = build_credential_provider(&config, prompt());
    assert!(matches!(
        result,
        Err(AppError::Auth(AuthError::MissingCredential(_)))
    ));
}

#[test]
fn startup_wiring_tests_static_token_provider_serves_configured_token() {
    let config = AppConfig {
        credential: CredentialConfig::AccessToken {
            token: "ya29.static".to_string(),
        },
        ..AppConfig::default()
    };

    let provider = build_credential_provider(&config, prompt()).expect("provider builds");
    assert_eq!(
        provider.access_token().expect("token").secret(),
        "ya29.static"
    );
}

#[test]
fn startup_wiring_tests_installed_app_needs_client_identity() {
    let config = AppConfig {
        credential: CredentialConfig::InstalledApp {
            client_secrets_file: None,
            client_id: Some("client-1".to_string()),
            client_secret: None,
        },
        ..AppConfig::default()
    };

    let result = build_credential_provider(&config, prompt());
    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::IncompleteInstalledApp))
    ));
}

#[test]
fn startup_wiring_tests_insecure_upload_base_is_rejected() {
    let mut config = AppConfig::default();
    config.drive.upload_base = "http://uploads.example.test/drive/v3".to_string();

    assert!(matches!(
        build_upload_client(&config),
        Err(AppError::Upload(_))
    ));
}

#[test]
fn startup_wiring_tests_default_camera_is_synthetic() {
    let camera = build_camera(&AppConfig::default().capture).expect("camera builds");
    assert_eq!(camera.name(), "synthetic");
}
