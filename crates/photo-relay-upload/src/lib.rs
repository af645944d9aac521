#![warn(missing_docs)]
//! # photo-relay-upload
//!
//! ## Purpose
//! Transfers one local JPEG to cloud storage and reports progress.
//!
//! ## Responsibilities
//! - Model file metadata, upload receipts, and progress snapshots.
//! - Drive either a single-request upload or a resumable chunked session.
//! - Keep the wire protocol behind [`DriveTransport`] so tests inject mocks.
//! - Provide the blocking HTTP transport used in production.
//!
//! ## Data flow
//! Upload coordinator obtains an [`AccessToken`] -> [`UploadClient::upload_file`]
//! reads the file -> transport opens a session and sends chunks -> progress
//! callback fires after every acknowledged chunk -> [`UploadReceipt`] returned.
//!
//! ## Ownership and lifetimes
//! The client borrows the token and path for one call; chunk buffers are owned
//! per iteration and dropped before the next read.
//!
//! ## Error model
//! Local I/O, network, and API rejections map to distinct [`UploadError`]
//! variants. Nothing is retried here.
//!
//! ## Security and privacy notes
//! Bearer tokens are passed through to the transport and never logged.

mod http;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use photo_relay_auth::{AccessToken, AuthError};
use photo_relay_core::JPEG_MIME;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use http::{DEFAULT_UPLOAD_BASE, HttpDriveTransport, RECEIPT_FIELDS, parse_persisted_range};

/// Resumable chunks must be multiples of this many bytes.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Largest resumable chunk the client will send.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Metadata sent with the file body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileMetadata {
    /// Remote file name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parent folder ids; empty means the drive root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    /// Media type of the body.
    pub mime_type: String,
}

impl DriveFileMetadata {
    /// Creates JPEG metadata with optional description and parent folder.
    pub fn jpeg(
        name: impl Into<String>,
        description: Option<String>,
        parent_folder_id: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            parents: parent_folder_id.into_iter().collect(),
            mime_type: JPEG_MIME.to_string(),
        }
    }
}

/// Identifier, name, and link of the created remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Remote file id.
    pub id: String,
    /// Remote file name.
    pub name: String,
    /// Browser link, when the API returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

/// Transfer strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// One multipart request carrying metadata and body.
    Simple,
    /// Session-based transfer in fixed-size chunks.
    Resumable {
        /// Chunk size in bytes; always a multiple of [`CHUNK_GRANULARITY`].
        chunk_size: usize,
    },
}

impl UploadMode {
    /// Resumable mode with `chunk_size` rounded up to the API granularity and
    /// capped at [`MAX_CHUNK_SIZE`].
    pub fn resumable(chunk_size: usize) -> Self {
        let chunks = chunk_size
            .min(MAX_CHUNK_SIZE)
            .div_ceil(CHUNK_GRANULARITY)
            .max(1);
        Self::Resumable {
            chunk_size: chunks * CHUNK_GRANULARITY,
        }
    }
}

/// Progress snapshot reported after each acknowledged transfer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes the server has persisted.
    pub bytes_sent: u64,
    /// File size.
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_sent.min(self.total_bytes) as f64) / (self.total_bytes as f64)
    }

    /// Completed percentage in `0..=100`, rounded down.
    pub fn percent(&self) -> u8 {
        percent_from_fraction(self.fraction())
    }
}

/// Converts a fraction into a clamped, rounded-down percentage.
pub fn percent_from_fraction(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0 + 1e-9).floor() as u8
}

/// Server answer to one resumable chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// More bytes are expected; the server holds `persisted` bytes.
    Incomplete {
        /// Contiguous bytes persisted from offset zero.
        persisted: u64,
    },
    /// Upload finished.
    Complete(UploadReceipt),
}

/// Wire protocol seam for the storage API.
pub trait DriveTransport: Send + Sync {
    /// Uploads metadata and body in one request.
    ///
    /// # Errors
    /// Returns network, API, or response errors as [`UploadError`].
    fn upload_simple(
        &self,
        token: &AccessToken,
        metadata: &DriveFileMetadata,
        body: &[u8],
    ) -> Result<UploadReceipt, UploadError>;

    /// Opens a resumable session and returns its URI.
    ///
    /// # Errors
    /// Returns network, API, or response errors as [`UploadError`].
    fn start_session(
        &self,
        token: &AccessToken,
        metadata: &DriveFileMetadata,
        total_bytes: u64,
    ) -> Result<String, UploadError>;

    /// Sends `chunk` starting at `offset` of a `total_bytes` upload.
    ///
    /// # Errors
    /// Returns network, API, or response errors as [`UploadError`].
    fn send_chunk(
        &self,
        token: &AccessToken,
        session_uri: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkStatus, UploadError>;
}

/// Upload client combining a transport with a transfer mode.
#[derive(Clone)]
pub struct UploadClient {
    transport: Arc<dyn DriveTransport>,
    mode: UploadMode,
}

impl UploadClient {
    /// Creates a client.
    pub fn new(transport: Arc<dyn DriveTransport>, mode: UploadMode) -> Self {
        Self { transport, mode }
    }

    /// Uploads the file at `path`.
    ///
    /// `on_progress` receives non-decreasing snapshots; the last one always
    /// covers the whole file.
    ///
    /// # Errors
    /// - [`UploadError::FileSystem`] when the file is missing, empty, or
    ///   unreadable. The transport is not contacted in that case.
    /// - Transport errors as returned.
    /// - [`UploadError::InvalidResponse`] when a resumable session stops
    ///   advancing.
    pub fn upload_file(
        &self,
        token: &AccessToken,
        path: &Path,
        metadata: &DriveFileMetadata,
        on_progress: &mut dyn FnMut(UploadProgress),
    ) -> Result<UploadReceipt, UploadError> {
        let total_bytes = std::fs::metadata(path)
            .map_err(|error| file_error(path, error))?
            .len();
        if total_bytes == 0 {
            return Err(UploadError::FileSystem(format!(
                "{} is empty",
                path.display()
            )));
        }

        match self.mode {
            UploadMode::Simple => {
                let body = std::fs::read(path).map_err(|error| file_error(path, error))?;
                let receipt = self.transport.upload_simple(token, metadata, &body)?;
                on_progress(UploadProgress {
                    bytes_sent: total_bytes,
                    total_bytes,
                });
                Ok(receipt)
            }
            UploadMode::Resumable { chunk_size } => {
                self.upload_resumable(token, path, metadata, total_bytes, chunk_size, on_progress)
            }
        }
    }

    fn upload_resumable(
        &self,
        token: &AccessToken,
        path: &Path,
        metadata: &DriveFileMetadata,
        total_bytes: u64,
        chunk_size: usize,
        on_progress: &mut dyn FnMut(UploadProgress),
    ) -> Result<UploadReceipt, UploadError> {
        let mut file = File::open(path).map_err(|error| file_error(path, error))?;
        let session_uri = self.transport.start_session(token, metadata, total_bytes)?;
        debug!(stage = "upload", action = "session_opened", total_bytes);

        let mut offset = 0_u64;
        let mut reported = 0_u64;
        loop {
            let chunk = read_chunk(&mut file, offset, chunk_size, total_bytes)
                .map_err(|error| file_error(path, error))?;
            match self
                .transport
                .send_chunk(token, &session_uri, &chunk, offset, total_bytes)?
            {
                ChunkStatus::Complete(receipt) => {
                    on_progress(UploadProgress {
                        bytes_sent: total_bytes,
                        total_bytes,
                    });
                    return Ok(receipt);
                }
                ChunkStatus::Incomplete { persisted } => {
                    if persisted <= offset || persisted > total_bytes {
                        return Err(UploadError::InvalidResponse(format!(
                            "resumable session stalled at {persisted} of {total_bytes} bytes"
                        )));
                    }
                    offset = persisted;
                    if persisted > reported {
                        reported = persisted;
                        on_progress(UploadProgress {
                            bytes_sent: reported,
                            total_bytes,
                        });
                    }
                }
            }
        }
    }
}

/// Reads at most `chunk_size` bytes at `offset`; the buffer never outgrows
/// what is left of the file.
fn read_chunk(
    file: &mut File,
    offset: u64,
    chunk_size: usize,
    total_bytes: u64,
) -> std::io::Result<Vec<u8>> {
    let len = (chunk_size as u64).min(total_bytes.saturating_sub(offset));
    file.seek(SeekFrom::Start(offset))?;
    let mut chunk = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut chunk)?;
    Ok(chunk)
}

fn file_error(path: &Path, error: std::io::Error) -> UploadError {
    UploadError::FileSystem(format!("{}: {error}", path.display()))
}

/// Upload layer error type.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Local file missing, empty, or unreadable.
    #[error("file system error: {0}")]
    FileSystem(String),
    /// No usable credentials.
    #[error("credential error: {0}")]
    Credential(#[from] AuthError),
    /// Request could not be delivered.
    #[error("network error: {0}")]
    Network(String),
    /// API rejected the request.
    #[error("api rejected upload ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Server-provided error message.
        message: String,
    },
    /// API answered with something the client cannot interpret.
    #[error("invalid api response: {0}")]
    InvalidResponse(String),
}
