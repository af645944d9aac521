//! Blocking HTTP transport speaking the Drive v3 upload protocol.

use std::time::Duration;

use photo_relay_auth::{AccessToken, validate_endpoint};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{ChunkStatus, DriveFileMetadata, DriveTransport, UploadError, UploadReceipt};

/// Default upload endpoint root.
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested on the created file.
pub const RECEIPT_FIELDS: &str = "id,name,webViewLink";

const MULTIPART_BOUNDARY: &str = "photo_relay_boundary_7f3a9c";

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// `reqwest` implementation of [`DriveTransport`].
#[derive(Debug, Clone)]
pub struct HttpDriveTransport {
    client: Client,
    files_url: Url,
}

impl HttpDriveTransport {
    /// Builds a transport for `upload_base` (e.g. [`DEFAULT_UPLOAD_BASE`]).
    ///
    /// Redirects are disabled so `308 Resume Incomplete` reaches the client.
    ///
    /// # Errors
    /// Returns [`UploadError::Network`] for insecure endpoints or client
    /// construction failures.
    pub fn new(
        upload_base: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, UploadError> {
        let base = validate_endpoint(upload_base)
            .map_err(|error| UploadError::Network(error.to_string()))?;
        let files_url = Url::parse(&format!("{}/files", base.as_str().trim_end_matches('/')))
            .map_err(|error| UploadError::Network(format!("invalid upload base: {error}")))?;

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|error| UploadError::Network(format!("http client init failed: {error}")))?;

        Ok(Self { client, files_url })
    }

    fn files_url(&self, upload_type: &str) -> Url {
        let mut url = self.files_url.clone();
        url.query_pairs_mut()
            .append_pair("uploadType", upload_type)
            .append_pair("fields", RECEIPT_FIELDS);
        url
    }
}

impl DriveTransport for HttpDriveTransport {
    fn upload_simple(
        &self,
        token: &AccessToken,
        metadata: &DriveFileMetadata,
        body: &[u8],
    ) -> Result<UploadReceipt, UploadError> {
        let payload = multipart_related_body(metadata, body)?;
        let response = self
            .client
            .post(self.files_url("multipart"))
            .header(AUTHORIZATION, bearer(token))
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(payload)
            .send()
            .map_err(network_error)?;

        let response = ensure_success(response)?;
        decode_receipt(response)
    }

    fn start_session(
        &self,
        token: &AccessToken,
        metadata: &DriveFileMetadata,
        total_bytes: u64,
    ) -> Result<String, UploadError> {
        let response = self
            .client
            .post(self.files_url("resumable"))
            .header(AUTHORIZATION, bearer(token))
            .header("X-Upload-Content-Type", metadata.mime_type.as_str())
            .header("X-Upload-Content-Length", total_bytes.to_string())
            .json(metadata)
            .send()
            .map_err(network_error)?;

        let response = ensure_success(response)?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::InvalidResponse("resumable session has no Location header".to_string())
            })
    }

    fn send_chunk(
        &self,
        token: &AccessToken,
        session_uri: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkStatus, UploadError> {
        let last = (offset + chunk.len() as u64).saturating_sub(1);
        debug!(stage = "upload", action = "chunk", offset, last, total_bytes);

        let response = self
            .client
            .put(session_uri)
            .header(AUTHORIZATION, bearer(token))
            .header(CONTENT_RANGE, format!("bytes {offset}-{last}/{total_bytes}"))
            .body(chunk.to_vec())
            .send()
            .map_err(network_error)?;

        if response.status() == StatusCode::PERMANENT_REDIRECT {
            let persisted = response
                .headers()
                .get(RANGE)
                .and_then(|value| value.to_str().ok())
                .map(parse_persisted_range)
                .transpose()?
                .unwrap_or(0);
            return Ok(ChunkStatus::Incomplete { persisted });
        }

        let response = ensure_success(response)?;
        decode_receipt(response).map(ChunkStatus::Complete)
    }
}

/// Parses a `Range: bytes=0-N` acknowledgement into a persisted byte count.
///
/// # Errors
/// Returns [`UploadError::InvalidResponse`] for malformed headers.
pub fn parse_persisted_range(header: &str) -> Result<u64, UploadError> {
    let malformed = || UploadError::InvalidResponse(format!("malformed Range header: {header}"));
    let range = header.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start, end) = range.split_once('-').ok_or_else(malformed)?;
    if start.trim() != "0" {
        return Err(malformed());
    }
    let end: u64 = end.trim().parse().map_err(|_| malformed())?;
    Ok(end + 1)
}

fn multipart_related_body(
    metadata: &DriveFileMetadata,
    body: &[u8],
) -> Result<Vec<u8>, UploadError> {
    let metadata_json = serde_json::to_string(metadata)
        .map_err(|error| UploadError::InvalidResponse(format!("metadata encoding: {error}")))?;

    let mut payload = Vec::with_capacity(body.len() + metadata_json.len() + 256);
    payload.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata_json}\r\n--{MULTIPART_BOUNDARY}\r\nContent-Type: {}\r\n\r\n",
            metadata.mime_type
        )
        .as_bytes(),
    );
    payload.extend_from_slice(body);
    payload.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    Ok(payload)
}

fn bearer(token: &AccessToken) -> String {
    format!("Bearer {}", token.secret())
}

fn network_error(error: reqwest::Error) -> UploadError {
    UploadError::Network(error.to_string())
}

fn ensure_success(response: Response) -> Result<Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    Err(UploadError::Api {
        status: status.as_u16(),
        message,
    })
}

fn decode_receipt(response: Response) -> Result<UploadReceipt, UploadError> {
    response
        .json::<UploadReceipt>()
        .map_err(|error| UploadError::InvalidResponse(error.to_string()))
}

#[cfg(test)]
mod tests {
    //! Unit tests for protocol helpers.

    use super::*;

    #[test]
    fn range_header_reports_exclusive_end() {
        assert_eq!(parse_persisted_range("bytes=0-262143").expect("range"), 262_144);
        assert!(parse_persisted_range("bytes=5-10").is_err());
        assert!(parse_persisted_range("items=0-1").is_err());
    }

    #[test]
    fn multipart_body_wraps_metadata_and_media() {
        let metadata = DriveFileMetadata::jpeg("p.jpg", None, None);
        let payload = multipart_related_body(&metadata, b"JPEG").expect("body");
        let text = String::from_utf8(payload).expect("utf8");
        assert!(text.contains("\"name\":\"p.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEG\r\n"));
        assert!(text.ends_with(&format!("--{MULTIPART_BOUNDARY}--\r\n")));
    }

    #[test]
    fn rejects_plain_http_upload_base() {
        assert!(
            HttpDriveTransport::new(
                "http://drive.example.test/upload",
                Duration::from_secs(1),
                Duration::from_secs(1)
            )
            .is_err()
        );
    }

    #[test]
    fn builds_files_url_with_query() {
        let transport = HttpDriveTransport::new(
            DEFAULT_UPLOAD_BASE,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .expect("transport");
        let url = transport.files_url("resumable");
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/upload/drive/v3/files?uploadType=resumable&fields=id%2Cname%2CwebViewLink"
        );
    }
}
