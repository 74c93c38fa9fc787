//! Protocol version 1: MD5 challenge over `app/update_secure`.
//!
//! The account proves knowledge of its license key by sending
//! `md5(license_key + public_ip)`, where the public IP is what the server
//! itself reports from `app/update_getipaddr`.

use std::path::Path;

use crate::cache::public_ip_key;
use crate::error::{UpdateError, UpdateResult};
use crate::transfer::{TransferRequest, TransferResponse, DATABASE_MD5_HEADER};
use crate::updater::digest::{digests_match, text_md5, MISSING_FILE_DIGEST};
use crate::updater::endpoint::Endpoint;

use super::Negotiation;

const UPDATE_PATH: &str = "app/update_secure";
const PUBLIC_IP_PATH: &str = "app/update_getipaddr";

/// Body the server sends when the local copy is current.
const NO_NEW_UPDATES: &str = "No new updates available";

pub(super) fn negotiate(
    endpoint: &Endpoint<'_>,
    local_digest: &str,
    download: &Path,
) -> UpdateResult<Negotiation> {
    let config = endpoint.configuration();
    let (user_id, license_key) = config.require_credentials()?;
    let product_id = config.require_product_id()?;

    let public_ip = endpoint.cached(&public_ip_key(), || {
        endpoint.text_request(PUBLIC_IP_PATH, "")
    })?;
    let challenge = text_md5(&format!("{}{}", license_key, public_ip));

    let query = format!(
        "db_md5={}&challenge_md5={}&user_id={}&edition_id={}",
        local_digest,
        challenge,
        user_id,
        urlencoding::encode(product_id)
    );
    let url = endpoint.url(config.scheme(), UPDATE_PATH, &query);
    let response = endpoint.fetch(
        TransferRequest::get(url).with_sink(download),
        TransferResponse::is_success,
    )?;

    let update_needed = update_needed(local_digest, &response)?;
    Ok(Negotiation {
        update_needed,
        response,
    })
}

/// Decide from a successful response whether its body is an update.
///
/// Without a digest header, any non-text body is taken to be the update.
/// That fallback can misfire if the server changes what it sends.
pub(crate) fn update_needed(local_digest: &str, response: &TransferResponse) -> UpdateResult<bool> {
    if local_digest == MISSING_FILE_DIGEST {
        return Ok(true);
    }
    if let Some(remote) = response.header(DATABASE_MD5_HEADER) {
        return Ok(!digests_match(remote, local_digest));
    }
    if response.media_type().as_deref() == Some("text/plain") {
        let text = response.text()?;
        if text == NO_NEW_UPDATES {
            return Ok(false);
        }
        return Err(UpdateError::Protocol(text.trim().to_string()));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::ResponseBody;
    use proptest::prelude::*;

    const LOCAL: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    fn plain(body: &str) -> TransferResponse {
        TransferResponse::new(200, "OK")
            .with_header("Content-Type", "text/plain")
            .with_body(ResponseBody::Buffered(body.to_string()))
    }

    #[test]
    fn test_missing_local_file_always_updates() {
        let response = plain("No new updates available").with_header(DATABASE_MD5_HEADER, LOCAL);
        assert!(update_needed(MISSING_FILE_DIGEST, &response).unwrap());
    }

    #[test]
    fn test_digest_header_decides() {
        let same = TransferResponse::new(200, "OK").with_header("X-Database-MD5", LOCAL);
        assert!(!update_needed(LOCAL, &same).unwrap());

        let upper = TransferResponse::new(200, "OK")
            .with_header("X-Database-MD5", LOCAL.to_ascii_uppercase());
        assert!(!update_needed(LOCAL, &upper).unwrap());

        let different = TransferResponse::new(200, "OK")
            .with_header("X-Database-MD5", "0123456789abcdef0123456789abcdef");
        assert!(update_needed(LOCAL, &different).unwrap());
    }

    #[test]
    fn test_no_updates_text() {
        assert!(!update_needed(LOCAL, &plain("No new updates available")).unwrap());
    }

    #[test]
    fn test_no_updates_text_must_match_exactly() {
        match update_needed(LOCAL, &plain("No new updates available\n")).unwrap_err() {
            UpdateError::Protocol(msg) => assert_eq!(msg, "No new updates available"),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_other_text_is_protocol_error() {
        let err = update_needed(LOCAL, &plain("Invalid license key")).unwrap_err();
        match err {
            UpdateError::Protocol(msg) => assert_eq!(msg, "Invalid license key"),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_body_without_header_updates() {
        let response =
            TransferResponse::new(200, "OK").with_header("Content-Type", "application/gzip");
        assert!(update_needed(LOCAL, &response).unwrap());
    }

    proptest! {
        #[test]
        fn prop_header_comparison_ignores_case(
            digest in "[0-9a-f]{32}",
            flips in proptest::collection::vec(any::<bool>(), 32),
        ) {
            let mixed: String = digest
                .chars()
                .zip(flips)
                .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
                .collect();
            let response = TransferResponse::new(200, "OK").with_header(DATABASE_MD5_HEADER, mixed);
            prop_assert!(!update_needed(&digest, &response).unwrap());
        }
    }
}
