#![warn(missing_docs)]
//! # photo-relay-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `photo-relay` workspace.
//!
//! ## Responsibilities
//! - Represent one captured photo and its upload lifecycle.
//! - Enforce legal upload-state transitions.
//! - Derive deterministic, timestamped photo file names.
//!
//! ## Data flow
//! The capture layer resolves a file path, the app wraps it in a
//! [`PhotoRecord`], and the upload coordinator drives the record through
//! [`UploadState`] until the file is uploaded or the attempt fails.
//!
//! ## Ownership and lifetimes
//! A record owns its [`PathBuf`] and is lent mutably to the upload coordinator
//! for the duration of one upload. Nothing in this crate is shared across
//! threads.
//!
//! ## Error model
//! Illegal transitions and timestamp formatting failures return [`CoreError`].
//!
//! ## Example
//! ```rust
//! use photo_relay_core::{PhotoRecord, UploadState};
//!
//! let mut record = PhotoRecord::new("/tmp/photo_20240101_120000.jpg", 1_000);
//! record.begin_upload().unwrap();
//! record.mark_uploaded().unwrap();
//! assert_eq!(record.upload_state(), UploadState::Uploaded);
//! ```

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

/// MIME type of every uploaded photo.
pub const JPEG_MIME: &str = "image/jpeg";

/// Default application subdirectory for captured photos.
pub const DEFAULT_APP_DIR: &str = "PhotoRelay";

/// Upload lifecycle of one captured photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    /// Captured, upload not started.
    Pending,
    /// Upload in progress.
    Uploading,
    /// Upload finished successfully.
    Uploaded,
    /// Upload failed; terminal for this attempt.
    Failed,
}

impl UploadState {
    /// Returns `true` for `Uploaded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed)
    }
}

/// Transient record for one captured photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    file_path: PathBuf,
    created_at_ms: u64,
    upload_state: UploadState,
}

impl PhotoRecord {
    /// Creates a record in `Pending` state.
    pub fn new(file_path: impl Into<PathBuf>, created_at_ms: u64) -> Self {
        Self {
            file_path: file_path.into(),
            created_at_ms,
            upload_state: UploadState::Pending,
        }
    }

    /// Absolute path of the photo on local storage.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Final path component, used as the remote file name.
    pub fn file_name(&self) -> Option<&str> {
        self.file_path.file_name().and_then(|name| name.to_str())
    }

    /// Capture completion time in Unix epoch milliseconds.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Current upload state.
    pub fn upload_state(&self) -> UploadState {
        self.upload_state
    }

    /// `Pending -> Uploading`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTransition`] from any other state.
    pub fn begin_upload(&mut self) -> Result<(), CoreError> {
        self.transition(UploadState::Pending, UploadState::Uploading)
    }

    /// `Uploading -> Uploaded`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTransition`] from any other state.
    pub fn mark_uploaded(&mut self) -> Result<(), CoreError> {
        self.transition(UploadState::Uploading, UploadState::Uploaded)
    }

    /// Moves any non-terminal record to `Failed`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTransition`] when the record is already
    /// terminal.
    pub fn mark_failed(&mut self) -> Result<(), CoreError> {
        if self.upload_state.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.upload_state,
                to: UploadState::Failed,
            });
        }
        self.upload_state = UploadState::Failed;
        Ok(())
    }

    fn transition(&mut self, expected: UploadState, next: UploadState) -> Result<(), CoreError> {
        if self.upload_state != expected {
            return Err(CoreError::InvalidTransition {
                from: self.upload_state,
                to: next,
            });
        }
        self.upload_state = next;
        Ok(())
    }
}

/// Builds `photo_YYYYMMDD_HHMMSS.jpg` for the given instant.
///
/// # Errors
/// Returns [`CoreError::Timestamp`] when the instant cannot be formatted.
pub fn photo_file_name(at: OffsetDateTime) -> Result<String, CoreError> {
    let stamp = at
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .map_err(|error| CoreError::Timestamp(error.to_string()))?;
    Ok(format!("photo_{stamp}.jpg"))
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Error type for core model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested state change is not part of the upload lifecycle.
    #[error("invalid upload state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// State before the rejected transition.
        from: UploadState,
        /// Requested target state.
        to: UploadState,
    },
    /// Timestamp could not be rendered.
    #[error("timestamp formatting failed: {0}")]
    Timestamp(String),
}
