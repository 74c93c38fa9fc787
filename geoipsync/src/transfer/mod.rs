//! HTTP transfer abstraction used by the updater.
//!
//! The updater never talks to the network directly. It builds a
//! [`TransferRequest`] and hands it to a [`TransferClient`], which returns the
//! status, the response headers and a body that is either buffered in memory
//! or already streamed to the requested sink file.
//!
//! ```text
//! Updater ──► TransferClient (trait)
//!                 ├── HttpTransferClient (reqwest, blocking)
//!                 └── test doubles
//! ```

mod http;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::{UpdateError, UpdateResult};

pub use http::{HttpTransferClient, DEFAULT_TIMEOUT_SECS};

/// Response header carrying the server's digest of the current database.
pub const DATABASE_MD5_HEADER: &str = "x-database-md5";

/// Performs blocking HTTP GET requests.
///
/// Implementations own any timeout or cancellation policy. A non-success
/// status is not an error at this level: the response is returned and the
/// caller decides which statuses it accepts.
pub trait TransferClient: Send + Sync {
    /// Perform the request.
    ///
    /// When `request.sink` is set, the body must be written to that file
    /// (created or truncated) and returned as [`ResponseBody::File`].
    fn get(&self, request: &TransferRequest) -> UpdateResult<TransferResponse>;
}

/// Credentials for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    pub basic_auth: Option<BasicAuth>,
    pub sink: Option<PathBuf>,
}

impl TransferRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            basic_auth: None,
            sink: None,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Stream the body into `path` instead of buffering it.
    pub fn with_sink(mut self, path: impl Into<PathBuf>) -> Self {
        self.sink = Some(path.into());
        self
    }
}

/// Where the response body ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Buffered(String),
    File(PathBuf),
}

/// Status, headers and body of a completed request.
#[derive(Debug, Clone)]
pub struct TransferResponse {
    status: u16,
    reason: String,
    /// Lowercase header names; repeated headers are joined with ", ".
    headers: BTreeMap<String, String>,
    body: ResponseBody,
}

impl TransferResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: BTreeMap::new(),
            body: ResponseBody::Buffered(String::new()),
        }
    }

    /// Add a header. Repeated names are joined.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append_header(name, value);
        self
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    pub(crate) fn append_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Content type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// The declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// The body as text, read back from the sink file when needed.
    pub fn text(&self) -> UpdateResult<String> {
        match &self.body {
            ResponseBody::Buffered(text) => Ok(text.clone()),
            ResponseBody::File(path) => {
                let bytes = fs::read(path).map_err(|e| UpdateError::ReadFailed {
                    path: path.clone(),
                    source: e,
                })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }
}
