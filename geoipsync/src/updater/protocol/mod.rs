//! The two update protocols.
//!
//! Both send a single negotiation request that streams its body into the
//! scratch download file, then decide from the local digest and the
//! response whether that body is an update to install.
//!
//! | Protocol          | Endpoint                               | Auth            |
//! |-------------------|----------------------------------------|-----------------|
//! | `LegacyChallenge` | `app/update_secure`                    | MD5 challenge   |
//! | `TokenAuth`       | `geoip/databases/{product}/update`     | HTTP Basic      |

mod legacy;
mod token;

use std::fmt;
use std::path::Path;

use crate::error::UpdateResult;
use crate::transfer::TransferResponse;

use super::configuration::{Configuration, ProtocolVersion};
use super::endpoint::Endpoint;

/// License keys up to this length use the legacy format.
pub const LEGACY_LICENSE_KEY_MAX_LEN: usize = 12;

/// Update protocol spoken with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Protocol version 1.
    LegacyChallenge,
    /// Protocol version 2.
    TokenAuth,
}

impl Protocol {
    /// Pick the protocol for `configuration`.
    ///
    /// An explicit version wins; otherwise short (legacy format) license
    /// keys select the challenge protocol.
    pub fn select(configuration: &Configuration) -> Self {
        match configuration.protocol_version() {
            Some(version) => Self::from(version),
            None if configuration.license_key().chars().count() <= LEGACY_LICENSE_KEY_MAX_LEN => {
                Protocol::LegacyChallenge
            }
            None => Protocol::TokenAuth,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        match self {
            Protocol::LegacyChallenge => ProtocolVersion::V1,
            Protocol::TokenAuth => ProtocolVersion::V2,
        }
    }

    /// Run the negotiation request, streaming its body to `download`.
    pub(crate) fn negotiate(
        &self,
        endpoint: &Endpoint<'_>,
        local_digest: &str,
        download: &Path,
    ) -> UpdateResult<Negotiation> {
        match self {
            Protocol::LegacyChallenge => legacy::negotiate(endpoint, local_digest, download),
            Protocol::TokenAuth => token::negotiate(endpoint, local_digest, download),
        }
    }
}

impl From<ProtocolVersion> for Protocol {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V1 => Protocol::LegacyChallenge,
            ProtocolVersion::V2 => Protocol::TokenAuth,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::LegacyChallenge => write!(f, "v1 (challenge)"),
            Protocol::TokenAuth => write!(f, "v2 (basic auth)"),
        }
    }
}

/// Result of the negotiation round trip.
#[derive(Debug)]
pub(crate) struct Negotiation {
    pub update_needed: bool,
    pub response: TransferResponse,
}
