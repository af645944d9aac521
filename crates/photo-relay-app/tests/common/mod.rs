//! Shared fixtures for app integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use photo_relay_app::{CaptureCoordinator, PhotoRelay, UploadCoordinator};
use photo_relay_auth::{AccessToken, AuthError, CredentialProvider};
use photo_relay_capture::{
    CameraBackend, CaptureCompletion, CaptureError, PendingCapture, PhotoPathPolicy,
    SyntheticCameraBackend, capture_channel,
};
use photo_relay_ui::{UiCommand, UiQueue, ui_channel};
use photo_relay_upload::{
    ChunkStatus, DriveFileMetadata, DriveTransport, UploadClient, UploadError, UploadMode,
    UploadReceipt,
};
use time::OffsetDateTime;
use time::macros::datetime;

/// Drive transport double that records every call.
#[derive(Default)]
pub struct RecordingDrive {
    pub calls: Mutex<Vec<String>>,
    /// Byte offsets acknowledged by successive chunk calls before completion.
    pub acks: Vec<u64>,
    /// When set, every call fails with this API status.
    pub fail_status: Option<u16>,
    /// When set, the file at this path is swapped for a directory mid-upload.
    pub sabotage_cleanup: Option<PathBuf>,
    /// Remote id returned in receipts.
    pub file_id: String,
}

#[allow(dead_code)]
impl RecordingDrive {
    /// Double that succeeds with id `abc123`.
    pub fn succeeding() -> Self {
        Self {
            file_id: "abc123".to_string(),
            ..Self::default()
        }
    }

    /// Recorded call log.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) -> Result<(), UploadError> {
        self.calls.lock().expect("calls lock").push(call);
        if let Some(path) = &self.sabotage_cleanup {
            if path.is_file() {
                std::fs::remove_file(path).expect("remove photo for sabotage");
                std::fs::create_dir(path).expect("replace photo with directory");
            }
        }
        match self.fail_status {
            Some(status) => Err(UploadError::Api {
                status,
                message: "backend unavailable".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn receipt(&self, name: &str) -> UploadReceipt {
        UploadReceipt {
            id: self.file_id.clone(),
            name: name.to_string(),
            web_view_link: None,
        }
    }
}

impl DriveTransport for RecordingDrive {
    fn upload_simple(
        &self,
        _token: &AccessToken,
        metadata: &DriveFileMetadata,
        body: &[u8],
    ) -> Result<UploadReceipt, UploadError> {
        self.record(format!("simple:{}:{}", metadata.name, body.len()))?;
        Ok(self.receipt(&metadata.name))
    }

    fn start_session(
        &self,
        _token: &AccessToken,
        metadata: &DriveFileMetadata,
        total_bytes: u64,
    ) -> Result<String, UploadError> {
        self.record(format!("session:{}:{total_bytes}", metadata.name))?;
        Ok(format!("https://upload.example.test/session/{}", metadata.name))
    }

    fn send_chunk(
        &self,
        _token: &AccessToken,
        session_uri: &str,
        chunk: &[u8],
        offset: u64,
        _total_bytes: u64,
    ) -> Result<ChunkStatus, UploadError> {
        let index = self
            .calls()
            .iter()
            .filter(|call| call.starts_with("chunk:"))
            .count();
        self.record(format!("chunk:{offset}+{}", chunk.len()))?;

        match self.acks.get(index) {
            Some(&persisted) => Ok(ChunkStatus::Incomplete { persisted }),
            None => {
                let name = session_uri.rsplit('/').next().unwrap_or_default();
                Ok(ChunkStatus::Complete(self.receipt(name)))
            }
        }
    }
}

/// Credential provider double counting token requests.
pub struct CountingProvider {
    calls: AtomicUsize,
    fail: bool,
}

#[allow(dead_code)]
impl CountingProvider {
    /// Provider that always hands out `test-token`.
    pub fn working() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Provider whose key material is unusable.
    pub fn broken() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of token requests served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for CountingProvider {
    fn access_token(&self) -> Result<AccessToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::InvalidKey("key file is corrupt".to_string()));
        }
        Ok(AccessToken::new("test-token", None))
    }

    fn describe(&self) -> &'static str {
        "counting"
    }
}

/// Camera double whose capture is resolved by the test.
#[allow(dead_code)]
#[derive(Default)]
pub struct ManualCamera {
    completion: Mutex<Option<CaptureCompletion>>,
}

#[allow(dead_code)]
impl ManualCamera {
    /// Resolves the outstanding capture with `saved`.
    pub fn complete(&self, saved: Option<PathBuf>) {
        let completion = self
            .completion
            .lock()
            .expect("completion lock")
            .take()
            .expect("a capture should be outstanding");
        completion.complete(saved);
    }
}

impl CameraBackend for ManualCamera {
    fn take_picture(&self, _target: &Path) -> Result<PendingCapture, CaptureError> {
        let (completion, pending) = capture_channel();
        *self.completion.lock().expect("completion lock") = Some(completion);
        Ok(pending)
    }

    fn name(&self) -> &str {
        "manual"
    }
}

/// `2024-01-01 12:00:00 UTC`.
pub fn new_year_noon() -> OffsetDateTime {
    datetime!(2024-01-01 12:00:00 UTC)
}

/// Path policy rooted in `root` with a `Pictures` directory and no external
/// storage.
pub fn pictures_policy(root: &Path, app_dir: &str) -> PhotoPathPolicy {
    PhotoPathPolicy::new(
        app_dir,
        None,
        Some(root.join("Pictures")),
        root.to_path_buf(),
    )
}

/// Writes a `len`-byte photo at `dir/name`.
#[allow(dead_code)]
pub fn write_photo(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![0xD8; len]).expect("photo fixture");
    path
}

/// Upload coordinator over the given doubles.
pub fn upload_coordinator(
    provider: Arc<CountingProvider>,
    drive: Arc<RecordingDrive>,
    mode: UploadMode,
) -> UploadCoordinator {
    UploadCoordinator::new(
        provider,
        UploadClient::new(drive, mode),
        Some("folder-1".to_string()),
        Some("test upload".to_string()),
    )
}

/// Relay wired to doubles, with its UI queue.
#[allow(dead_code)]
pub fn relay(
    root: &Path,
    camera: Arc<dyn CameraBackend>,
    provider: Arc<CountingProvider>,
    drive: Arc<RecordingDrive>,
) -> (PhotoRelay, UiQueue) {
    let (notifier, queue) = ui_channel();
    let capture =
        CaptureCoordinator::new(camera, pictures_policy(root, "PhotoUploader")).with_clock(new_year_noon);
    let upload = upload_coordinator(provider, drive, UploadMode::Simple);
    (PhotoRelay::new(capture, upload, notifier), queue)
}

/// Synthetic camera writing real files.
#[allow(dead_code)]
pub fn synthetic_camera() -> Arc<dyn CameraBackend> {
    Arc::new(SyntheticCameraBackend::new())
}

/// Trigger enable/disable commands in posting order.
#[allow(dead_code)]
pub fn trigger_toggles(commands: &[UiCommand]) -> Vec<bool> {
    commands
        .iter()
        .filter_map(|command| match command {
            UiCommand::SetTriggerEnabled(enabled) => Some(*enabled),
            _ => None,
        })
        .collect()
}

/// Status texts in posting order.
#[allow(dead_code)]
pub fn status_texts(commands: &[UiCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|command| match command {
            UiCommand::SetStatus { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
