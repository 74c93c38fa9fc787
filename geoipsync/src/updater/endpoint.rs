//! Request helpers shared by both protocols.

use std::fs;
use std::io;
use std::path::Path;

use crate::cache::{CacheStore, CACHE_TTL};
use crate::error::{UpdateError, UpdateResult};
use crate::transfer::{TransferClient, TransferRequest, TransferResponse};

use super::configuration::{Configuration, Scheme};

/// Media type every database download must carry.
pub(crate) const GZIP_MEDIA_TYPE: &str = "application/gzip";

/// Borrowed view of the updater's collaborators for one attempt.
pub(crate) struct Endpoint<'a> {
    configuration: &'a Configuration,
    client: &'a dyn TransferClient,
    cache: Option<&'a dyn CacheStore>,
}

impl<'a> Endpoint<'a> {
    pub(crate) fn new(
        configuration: &'a Configuration,
        client: &'a dyn TransferClient,
        cache: Option<&'a dyn CacheStore>,
    ) -> Self {
        Self {
            configuration,
            client,
            cache,
        }
    }

    pub(crate) fn configuration(&self) -> &Configuration {
        self.configuration
    }

    /// Absolute URL for `path` on the configured host.
    pub(crate) fn url(&self, scheme: Scheme, path: &str, query: &str) -> String {
        let mut url = format!(
            "{}://{}/{}",
            scheme,
            self.configuration.host(),
            path.trim_start_matches('/')
        );
        let query = query.trim_start_matches('?');
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Send `request` and fail unless `accept` approves the response.
    ///
    /// The failure message is the server's reason phrase, replaced by the
    /// trimmed body when the server explained itself in text.
    pub(crate) fn fetch(
        &self,
        request: TransferRequest,
        accept: impl Fn(&TransferResponse) -> bool,
    ) -> UpdateResult<TransferResponse> {
        let target = without_query(&request.url);
        tracing::debug!(url = target, streamed = request.sink.is_some(), "Sending request");
        let response = self.client.get(&request)?;
        tracing::debug!(url = target, status = response.status(), "Received response");

        if accept(&response) {
            return Ok(response);
        }

        let mut reason = response.reason().trim().to_string();
        let textual = response
            .media_type()
            .is_some_and(|media| media.starts_with("text/"));
        if textual {
            let body = response.text()?;
            let body = body.trim();
            if !body.is_empty() {
                reason = body.to_string();
            }
        }
        if reason.is_empty() {
            reason = format!("HTTP status {}", response.status());
        }
        Err(UpdateError::Protocol(reason))
    }

    /// GET a small `text/plain` resource and return its trimmed body.
    pub(crate) fn text_request(&self, path: &str, query: &str) -> UpdateResult<String> {
        let url = self.url(self.configuration.scheme(), path, query);
        let response = self.fetch(TransferRequest::get(url), TransferResponse::is_success)?;

        if let Some(media) = response.media_type() {
            if !media.starts_with("text/plain") {
                return Err(UpdateError::Protocol(format!(
                    "invalid data received: {}",
                    media
                )));
            }
        }
        Ok(response.text()?.trim().to_string())
    }

    /// Return the cached value for `key`, or compute and store it.
    ///
    /// Cache failures are logged and bypassed.
    pub(crate) fn cached(
        &self,
        key: &str,
        fetch: impl FnOnce() -> UpdateResult<String>,
    ) -> UpdateResult<String> {
        if let Some(cache) = self.cache {
            match cache.get(key) {
                Ok(Some(value)) => {
                    tracing::debug!(key, "Cache hit");
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(key, error = %e, "Cache read failed, querying server"),
            }
        }

        let value = fetch()?;

        if let Some(cache) = self.cache {
            if let Err(e) = cache.set(key, value.clone(), CACHE_TTL) {
                tracing::warn!(key, error = %e, "Failed to store value in cache");
            }
        }
        Ok(value)
    }
}

/// `url` without its query string, which may carry account details.
fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Check a streamed download before it is decompressed.
///
/// Returns the number of bytes on disk. A missing Content-Type is rejected
/// like any other type that is not gzip.
pub(crate) fn verify_download(response: &TransferResponse, download: &Path) -> UpdateResult<u64> {
    let media = response.media_type().unwrap_or_default();
    if media != GZIP_MEDIA_TYPE {
        return Err(UpdateError::Protocol(media));
    }

    let size = match fs::metadata(download) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => 0,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => {
            return Err(UpdateError::ReadFailed {
                path: download.to_path_buf(),
                source: e,
            })
        }
    };
    if size < 1 {
        return Err(UpdateError::EmptyDownload);
    }

    if let Some(expected) = response.content_length() {
        if expected != size {
            return Err(UpdateError::LengthMismatch {
                expected,
                actual: size,
            });
        }
    }
    Ok(size)
}
