//! Deterministic camera backend for tests and headless runs.

use std::path::Path;
use std::sync::Mutex;

use crate::{CameraBackend, CaptureError, PendingCapture, capture_channel};

/// Smallest JPEG container the uploader will accept: SOI, JFIF APP0, EOI.
const SYNTHETIC_JPEG: [u8; 22] = [
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

/// Outcome the synthetic backend produces on every capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntheticMode {
    /// Write a JPEG to the target and report it.
    Capture,
    /// Report that the user cancelled.
    Cancel,
    /// Report a backend failure with this reason.
    Fail(String),
    /// Report the target path without writing it.
    ReportMissing,
}

/// Camera backend that never touches hardware.
#[derive(Debug)]
pub struct SyntheticCameraBackend {
    mode: SyntheticMode,
    captures: Mutex<u64>,
}

impl SyntheticCameraBackend {
    /// Creates a backend that always succeeds.
    pub fn new() -> Self {
        Self::with_mode(SyntheticMode::Capture)
    }

    /// Creates a backend with a fixed outcome.
    pub fn with_mode(mode: SyntheticMode) -> Self {
        Self {
            mode,
            captures: Mutex::new(0),
        }
    }

    /// Number of captures started so far.
    pub fn capture_count(&self) -> u64 {
        self.captures.lock().map(|count| *count).unwrap_or(0)
    }
}

impl Default for SyntheticCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SyntheticCameraBackend {
    fn take_picture(&self, target: &Path) -> Result<PendingCapture, CaptureError> {
        let mut captures = self
            .captures
            .lock()
            .map_err(|_| CaptureError::Backend("synthetic counter lock poisoned".to_string()))?;
        *captures += 1;

        let (completion, pending) = capture_channel();
        match &self.mode {
            SyntheticMode::Capture => match std::fs::write(target, SYNTHETIC_JPEG) {
                Ok(()) => completion.complete(Some(target.to_path_buf())),
                Err(error) => completion.fail(format!("synthetic write failed: {error}")),
            },
            SyntheticMode::Cancel => completion.complete(None),
            SyntheticMode::Fail(reason) => completion.fail(reason.clone()),
            SyntheticMode::ReportMissing => completion.complete(Some(target.to_path_buf())),
        }
        Ok(pending)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for synthetic capture behavior.

    use super::*;

    #[test]
    fn synthetic_backend_writes_jpeg() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("photo.jpg");
        let backend = SyntheticCameraBackend::new();

        let saved = backend
            .take_picture(&target)
            .expect("capture should start")
            .wait()
            .expect("capture should finish");

        assert_eq!(saved, target);
        let bytes = std::fs::read(&saved).expect("photo readable");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(backend.capture_count(), 1);
    }

    #[test]
    fn cancel_mode_reports_cancellation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = SyntheticCameraBackend::with_mode(SyntheticMode::Cancel);
        let result = backend
            .take_picture(&dir.path().join("photo.jpg"))
            .expect("capture should start")
            .wait();
        assert!(matches!(result, Err(CaptureError::Cancelled)));
    }
}
