//! Capture and upload coordinators plus the single-flight relay that wires
//! them to the UI queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;

use photo_relay_auth::CredentialProvider;
use photo_relay_capture::{CameraBackend, PendingCapture, PhotoPathPolicy, ResolvedPath};
use photo_relay_core::{PhotoRecord, now_ms, photo_file_name};
use photo_relay_ui::{StatusTone, UiNotifier};
use photo_relay_upload::{DriveFileMetadata, UploadClient, UploadError, UploadReceipt};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{AppError, redact_sensitive};

/// Chooses the destination and starts the camera.
pub struct CaptureCoordinator {
    camera: Arc<dyn CameraBackend>,
    paths: PhotoPathPolicy,
    clock: fn() -> OffsetDateTime,
}

impl CaptureCoordinator {
    /// Creates a coordinator using the UTC wall clock for file names.
    pub fn new(camera: Arc<dyn CameraBackend>, paths: PhotoPathPolicy) -> Self {
        Self {
            camera,
            paths,
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Replaces the clock used to name photos.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Resolves the target path and starts a non-blocking capture.
    ///
    /// # Errors
    /// Returns [`AppError::Core`] when the timestamp cannot be formatted and
    /// [`AppError::Capture`] when the backend refuses to start.
    pub fn begin_capture(&self) -> Result<(ResolvedPath, PendingCapture), AppError> {
        let file_name = photo_file_name((self.clock)())?;
        let target = self.paths.resolve(&file_name);
        info!(
            stage = "capture",
            action = "start",
            backend = self.camera.name(),
            location = ?target.location,
            path = %target.path.display(),
        );

        let pending = self.camera.take_picture(&target.path)?;
        Ok((target, pending))
    }

    /// Captures a photo and blocks until the camera resolves it.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] for cancelled, failed, or missing
    /// captures.
    pub fn capture_photo(&self) -> Result<PathBuf, AppError> {
        let (_, pending) = self.begin_capture()?;
        Ok(pending.wait()?)
    }
}

/// Authenticates, uploads, and cleans up one photo.
pub struct UploadCoordinator {
    credentials: Arc<dyn CredentialProvider>,
    client: UploadClient,
    folder_id: Option<String>,
    description: Option<String>,
}

impl UploadCoordinator {
    /// Creates a coordinator; `credentials` is the provider selected at
    /// startup and is read-only from here on.
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        client: UploadClient,
        folder_id: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            credentials,
            client,
            folder_id,
            description: description.filter(|text| !text.trim().is_empty()),
        }
    }

    /// Uploads the photo behind `record` and posts progress to `notifier`.
    ///
    /// A missing file fails before credentials or network are touched. Every
    /// other outcome removes the local file on a best-effort basis.
    ///
    /// # Errors
    /// - [`AppError::Upload`] wrapping [`UploadError::FileSystem`],
    ///   [`UploadError::Credential`], or a transport failure.
    /// - [`AppError::Core`] when `record` is not in `Pending` state.
    pub fn upload(
        &self,
        record: &mut PhotoRecord,
        notifier: &UiNotifier,
    ) -> Result<UploadReceipt, AppError> {
        let path = record.file_path().to_path_buf();
        if !path.is_file() {
            record.mark_failed()?;
            return Err(UploadError::FileSystem(format!("{} does not exist", path.display())).into());
        }

        record.begin_upload()?;
        notifier.progress(0);
        info!(
            stage = "upload",
            action = "start",
            strategy = self.credentials.describe(),
            path = %path.display(),
        );

        let result = self.transfer(record, notifier);
        discard_photo(&path);

        match result {
            Ok(receipt) => {
                record.mark_uploaded()?;
                info!(stage = "upload", action = "done", id = %receipt.id, name = %receipt.name);
                Ok(receipt)
            }
            Err(error) => {
                record.mark_failed()?;
                warn!(
                    stage = "upload",
                    action = "failed",
                    error = %redact_sensitive(&error.to_string()),
                );
                Err(error.into())
            }
        }
    }

    fn transfer(
        &self,
        record: &PhotoRecord,
        notifier: &UiNotifier,
    ) -> Result<UploadReceipt, UploadError> {
        let name = record.file_name().ok_or_else(|| {
            UploadError::FileSystem(format!(
                "{} has no usable file name",
                record.file_path().display()
            ))
        })?;
        let token = self.credentials.access_token()?;
        let metadata =
            DriveFileMetadata::jpeg(name, self.description.clone(), self.folder_id.clone());

        let mut last_percent = 0_u8;
        self.client
            .upload_file(&token, record.file_path(), &metadata, &mut |progress| {
                let percent = progress.percent();
                if percent > last_percent {
                    last_percent = percent;
                    notifier.progress(percent);
                }
            })
    }
}

/// Removes a local photo, logging instead of failing.
pub fn discard_photo(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(stage = "cleanup", action = "removed", path = %path.display()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(
            stage = "cleanup",
            action = "remove_failed",
            path = %path.display(),
            %error,
        ),
    }
}

/// Coarse relay phase, `Idle -> Capturing -> Uploading -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayPhase {
    /// Ready for a trigger press.
    Idle = 0,
    /// Waiting for the camera.
    Capturing = 1,
    /// Transferring the photo.
    Uploading = 2,
}

impl RelayPhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Capturing,
            2 => Self::Uploading,
            _ => Self::Idle,
        }
    }
}

/// Terminal result of one capture-then-upload sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Photo uploaded.
    Uploaded(UploadReceipt),
    /// Camera failed or was cancelled; the message was shown to the user.
    CaptureFailed(String),
    /// Upload failed; the message was shown to the user.
    UploadFailed(String),
}

/// Re-enables the trigger exactly once, when the sequence ends.
struct TriggerRelease {
    notifier: UiNotifier,
    phase: Arc<AtomicU8>,
}

impl TriggerRelease {
    fn enter(&self, phase: RelayPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }
}

impl Drop for TriggerRelease {
    fn drop(&mut self) {
        self.phase.store(RelayPhase::Idle as u8, Ordering::SeqCst);
        self.notifier.trigger_enabled(true);
    }
}

/// Single-flight orchestrator behind the trigger control.
pub struct PhotoRelay {
    capture: Arc<CaptureCoordinator>,
    upload: Arc<UploadCoordinator>,
    notifier: UiNotifier,
    phase: Arc<AtomicU8>,
}

impl PhotoRelay {
    /// Wires both coordinators to the UI queue.
    pub fn new(capture: CaptureCoordinator, upload: UploadCoordinator, notifier: UiNotifier) -> Self {
        Self {
            capture: Arc::new(capture),
            upload: Arc::new(upload),
            notifier,
            phase: Arc::new(AtomicU8::new(RelayPhase::Idle as u8)),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RelayPhase {
        RelayPhase::from_raw(self.phase.load(Ordering::SeqCst))
    }

    /// Handles a trigger press.
    ///
    /// Disables the trigger, starts the camera, and hands the wait and upload
    /// to a worker thread. The trigger is re-enabled once the sequence ends,
    /// whatever the outcome.
    ///
    /// # Errors
    /// - [`AppError::Busy`] when a sequence is already in flight; nothing is
    ///   posted to the UI in that case.
    /// - Capture start failures, after they were reported to the UI.
    /// - [`AppError::Worker`] when the worker thread cannot be spawned.
    pub fn on_trigger(&self) -> Result<JoinHandle<SequenceOutcome>, AppError> {
        self.phase
            .compare_exchange(
                RelayPhase::Idle as u8,
                RelayPhase::Capturing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| AppError::Busy)?;

        let release = TriggerRelease {
            notifier: self.notifier.clone(),
            phase: Arc::clone(&self.phase),
        };
        self.notifier.trigger_enabled(false);
        self.notifier.status("Taking photo...", StatusTone::Busy);

        let pending = match self.capture.begin_capture() {
            Ok((_, pending)) => pending,
            Err(error) => {
                report_capture_failure(&self.notifier, &error);
                return Err(error);
            }
        };

        let upload = Arc::clone(&self.upload);
        let notifier = self.notifier.clone();
        std::thread::Builder::new()
            .name("photo-relay-worker".to_string())
            .spawn(move || run_sequence(pending, &upload, &notifier, release))
            .map_err(|error| report_spawn_failure(&self.notifier, &error))
    }
}

fn run_sequence(
    pending: PendingCapture,
    upload: &UploadCoordinator,
    notifier: &UiNotifier,
    release: TriggerRelease,
) -> SequenceOutcome {
    let path = match pending.wait() {
        Ok(path) => path,
        Err(error) => {
            let error = AppError::from(error);
            return SequenceOutcome::CaptureFailed(report_capture_failure(notifier, &error));
        }
    };

    release.enter(RelayPhase::Uploading);
    let mut record = PhotoRecord::new(path, now_ms());
    match upload.upload(&mut record, notifier) {
        Ok(receipt) => {
            notifier.status(format!("Uploaded {}", receipt.name), StatusTone::Success);
            notifier.popup("Upload complete", success_message(&receipt));
            SequenceOutcome::Uploaded(receipt)
        }
        Err(error) => {
            let message = redact_sensitive(&error.to_string());
            notifier.status("Upload failed", StatusTone::Error);
            notifier.popup("Upload failed", message.clone());
            SequenceOutcome::UploadFailed(message)
        }
    }
}

fn report_capture_failure(notifier: &UiNotifier, error: &AppError) -> String {
    let message = error.to_string();
    warn!(stage = "capture", action = "failed", error = %message);
    notifier.status("Camera error", StatusTone::Error);
    notifier.popup("Camera error", message.clone());
    message
}

/// The trigger itself is re-enabled by the dropped worker closure.
fn report_spawn_failure(notifier: &UiNotifier, error: &std::io::Error) -> AppError {
    let error = AppError::Worker(format!("failed to spawn upload worker: {error}"));
    let message = error.to_string();
    warn!(stage = "worker", action = "spawn_failed", error = %message);
    notifier.status("Worker error", StatusTone::Error);
    notifier.popup("Worker error", message);
    error
}

fn success_message(receipt: &UploadReceipt) -> String {
    match &receipt.web_view_link {
        Some(link) => format!("Uploaded {} (id {})\n{link}", receipt.name, receipt.id),
        None => format!("Uploaded {} (id {})", receipt.name, receipt.id),
    }
}
