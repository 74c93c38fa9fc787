//! Protocol version 2: conditional GET with HTTP basic auth.
//!
//! The server answers `304 Not Modified` when the digest it receives matches
//! its current database. That status is only acceptable when a local copy
//! exists; with the missing-file digest there is nothing to be unmodified.

use std::path::Path;

use crate::error::{UpdateError, UpdateResult};
use crate::transfer::{TransferRequest, TransferResponse, DATABASE_MD5_HEADER};
use crate::updater::configuration::Scheme;
use crate::updater::digest::{digests_match, MISSING_FILE_DIGEST};
use crate::updater::endpoint::Endpoint;

use super::Negotiation;

const NOT_MODIFIED: u16 = 304;

pub(super) fn negotiate(
    endpoint: &Endpoint<'_>,
    local_digest: &str,
    download: &Path,
) -> UpdateResult<Negotiation> {
    let config = endpoint.configuration();
    let (user_id, license_key) = config.require_credentials()?;
    let product_id = config.require_product_id()?;

    let path = format!(
        "geoip/databases/{}/update",
        urlencoding::encode(product_id)
    );
    let url = endpoint.url(Scheme::Https, &path, &format!("db_md5={}", local_digest));
    let request = TransferRequest::get(url)
        .with_basic_auth(user_id.to_string(), license_key)
        .with_sink(download);

    let has_local_copy = local_digest != MISSING_FILE_DIGEST;
    let response = endpoint.fetch(request, |response| {
        response.is_success() || (has_local_copy && response.status() == NOT_MODIFIED)
    })?;

    let update_needed = update_needed(local_digest, &response)?;
    Ok(Negotiation {
        update_needed,
        response,
    })
}

/// Decide from an accepted response whether its body is an update.
pub(crate) fn update_needed(local_digest: &str, response: &TransferResponse) -> UpdateResult<bool> {
    if local_digest == MISSING_FILE_DIGEST {
        return Ok(true);
    }
    if response.status() == NOT_MODIFIED {
        return Ok(false);
    }
    if let Some(remote) = response.header(DATABASE_MD5_HEADER) {
        return Ok(!digests_match(remote, local_digest));
    }
    if response.media_type().as_deref() == Some("text/plain") {
        return Err(UpdateError::Protocol(response.text()?.trim().to_string()));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::ResponseBody;

    const LOCAL: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    #[test]
    fn test_missing_local_file_always_updates() {
        let response = TransferResponse::new(200, "OK").with_header(DATABASE_MD5_HEADER, LOCAL);
        assert!(update_needed(MISSING_FILE_DIGEST, &response).unwrap());
    }

    #[test]
    fn test_not_modified() {
        // A 304 ignores any digest header
        let response = TransferResponse::new(304, "Not Modified")
            .with_header(DATABASE_MD5_HEADER, "ffffffffffffffffffffffffffffffff");
        assert!(!update_needed(LOCAL, &response).unwrap());
    }

    #[test]
    fn test_digest_header_decides() {
        let same = TransferResponse::new(200, "OK").with_header("x-database-md5", LOCAL.to_ascii_uppercase());
        assert!(!update_needed(LOCAL, &same).unwrap());

        let different = TransferResponse::new(200, "OK")
            .with_header("x-database-md5", "0123456789abcdef0123456789abcdef");
        assert!(update_needed(LOCAL, &different).unwrap());
    }

    #[test]
    fn test_text_body_is_always_an_error() {
        let response = TransferResponse::new(200, "OK")
            .with_header("Content-Type", "text/plain")
            .with_body(ResponseBody::Buffered("No new updates available".to_string()));
        let err = update_needed(LOCAL, &response).unwrap_err();
        assert!(matches!(err, UpdateError::Protocol(ref msg) if msg == "No new updates available"));
    }

    #[test]
    fn test_binary_body_without_header_updates() {
        let response =
            TransferResponse::new(200, "OK").with_header("Content-Type", "application/gzip");
        assert!(update_needed(LOCAL, &response).unwrap());
    }
}
