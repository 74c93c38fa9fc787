//! Blocking HTTP client backed by reqwest.
//!
//! Bodies destined for a sink are streamed to disk through a 64KB buffer so
//! database downloads never have to fit in memory.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};

use super::{ResponseBody, TransferClient, TransferRequest, TransferResponse};
use crate::error::{UpdateError, UpdateResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Production [`TransferClient`].
#[derive(Debug)]
pub struct HttpTransferClient {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpTransferClient {
    /// Create a client with the default timeout.
    pub fn new() -> UpdateResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> UpdateResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geoipsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpdateError::Transfer {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> UpdateError {
        if e.is_timeout() {
            UpdateError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            UpdateError::Transfer {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// Stream the response body to `dest`, returning the number of bytes written.
    fn stream_to_file(&self, url: &str, response: &mut Response, dest: &Path) -> UpdateResult<u64> {
        let file = File::create(dest).map_err(|e| UpdateError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let bytes_read =
                response
                    .read(&mut buffer)
                    .map_err(|e| UpdateError::Transfer {
                        url: url.to_string(),
                        reason: format!("read error: {}", e),
                    })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| UpdateError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            written += bytes_read as u64;
        }

        writer.flush().map_err(|e| UpdateError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(written)
    }
}

impl TransferClient for HttpTransferClient {
    fn get(&self, request: &TransferRequest) -> UpdateResult<TransferResponse> {
        let url = request.url.as_str();
        let mut builder = self.client.get(url);
        if let Some(auth) = &request.basic_auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }

        let mut response = builder.send().map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        let mut result = TransferResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
        );
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                result.append_header(name.as_str(), value);
            }
        }

        let body = match &request.sink {
            Some(path) => {
                let bytes = self.stream_to_file(url, &mut response, path)?;
                tracing::debug!(path = %path.display(), bytes, "Streamed response body");
                ResponseBody::File(path.clone())
            }
            None => ResponseBody::Buffered(response.text().map_err(|e| self.request_error(url, e))?),
        };

        Ok(result.with_body(body))
    }
}
