#![warn(missing_docs)]
//! # photo-relay-capture
//!
//! ## Purpose
//! Provides destination-path selection and the non-blocking camera boundary.
//!
//! ## Responsibilities
//! - Pick where a new photo is written using a first-available fallback chain.
//! - Define a backend-agnostic [`CameraBackend`] trait whose completion is a
//!   single-shot [`PendingCapture`].
//! - Expose a real backend that drives an external capture program.
//! - Expose a deterministic synthetic backend for CI and unit tests.
//!
//! ## Data flow
//! App asks [`PhotoPathPolicy`] for a target path -> backend starts capture and
//! returns [`PendingCapture`] immediately -> a worker waits on it and receives
//! the saved path or a [`CaptureError`].
//!
//! ## Ownership and lifetimes
//! The completion side ([`CaptureCompletion`]) is moved into whichever thread
//! finishes the capture; the pending side is moved into the waiting worker.
//! Each side is consumed on use, so a capture resolves at most once.
//!
//! ## Error model
//! Cancellation, missing output files, and backend failures are reported as
//! [`CaptureError`] values. Path-probe failures are logged and skipped.

mod command;
mod path_policy;
mod synthetic;

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use thiserror::Error;

pub use command::{CommandCameraBackend, PATH_PLACEHOLDER};
pub use path_policy::{PhotoPathPolicy, ResolvedPath, StorageLocation};
pub use synthetic::{SyntheticCameraBackend, SyntheticMode};

/// Trait implemented by concrete camera providers.
pub trait CameraBackend: Send + Sync {
    /// Starts a capture that writes to `target` and returns immediately.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] when the capture cannot be started.
    fn take_picture(&self, target: &Path) -> Result<PendingCapture, CaptureError>;

    /// Short backend label for logs.
    fn name(&self) -> &str;
}

enum CaptureSignal {
    Saved(Option<PathBuf>),
    Failed(String),
}

/// Creates a linked completion/pending pair for one capture.
pub fn capture_channel() -> (CaptureCompletion, PendingCapture) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (
        CaptureCompletion { sender },
        PendingCapture { receiver },
    )
}

/// Resolving side of a capture, held by the backend.
#[derive(Debug)]
pub struct CaptureCompletion {
    sender: mpsc::SyncSender<CaptureSignal>,
}

impl CaptureCompletion {
    /// Reports the saved file, or `None` when the user cancelled.
    pub fn complete(self, saved: Option<PathBuf>) {
        let _ = self.sender.send(CaptureSignal::Saved(saved));
    }

    /// Reports a backend failure.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.sender.send(CaptureSignal::Failed(reason.into()));
    }
}

/// Waiting side of a capture.
#[derive(Debug)]
pub struct PendingCapture {
    receiver: mpsc::Receiver<CaptureSignal>,
}

impl PendingCapture {
    /// Blocks until the backend resolves the capture.
    ///
    /// # Errors
    /// - [`CaptureError::Cancelled`] when no file was produced or the backend
    ///   dropped the completion without resolving it.
    /// - [`CaptureError::MissingOutput`] when the reported file does not exist.
    /// - [`CaptureError::Backend`] when the backend reported a failure.
    pub fn wait(self) -> Result<PathBuf, CaptureError> {
        match self.receiver.recv() {
            Ok(CaptureSignal::Saved(Some(path))) if path.is_file() => Ok(path),
            Ok(CaptureSignal::Saved(Some(path))) => Err(CaptureError::MissingOutput(path)),
            Ok(CaptureSignal::Saved(None)) | Err(_) => Err(CaptureError::Cancelled),
            Ok(CaptureSignal::Failed(reason)) => Err(CaptureError::Backend(reason)),
        }
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// User cancelled or the backend produced nothing.
    #[error("no photo taken")]
    Cancelled,
    /// Backend reported a path that does not exist.
    #[error("captured file is missing: {}", .0.display())]
    MissingOutput(PathBuf),
    /// Backend runtime failure.
    #[error("camera failure: {0}")]
    Backend(String),
}
