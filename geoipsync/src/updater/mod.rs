//! Database updater.
//!
//! [`Updater::update`] runs one synchronization attempt:
//!
//! ```text
//! update()
//!    │
//!    ├── local_digest()                MD5 of the installed file, or the zero sentinel
//!    ├── ScratchSpace::create()        private directory, removed on every exit path
//!    ├── Protocol::negotiate()         one request, body streamed to <scratch>/downloaded
//!    │       ├── LegacyChallenge
//!    │       └── TokenAuth
//!    ├── verify_download()             media type, non-empty, Content-Length
//!    └── install::decode_and_install() ISIZE + CRC check, then one atomic rename
//! ```
//!
//! The updater holds no locks. Two attempts against the same database path
//! must be serialized by the caller: one attempt's rename could otherwise
//! land between the other's checks and its own rename.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geoipsync::{Configuration, HttpTransferClient, MemoryCacheStore, Updater};
//!
//! let configuration = Configuration::new()
//!     .with_user_id(Some(123456))?
//!     .with_license_key("0123456789abcdef0123")
//!     .with_product_id("GeoLite2-City")
//!     .with_database_path("/var/lib/geoip/GeoLite2-City.mmdb");
//!
//! let updater = Updater::new(configuration, Arc::new(HttpTransferClient::new()?))
//!     .with_cache(Arc::new(MemoryCacheStore::new()));
//!
//! if updater.update()? {
//!     println!("the database has been updated");
//! }
//! ```

mod configuration;
mod digest;
mod endpoint;
mod install;
mod protocol;
mod scratch;

use std::sync::Arc;

use crate::cache::{filename_key, CacheStore};
use crate::error::UpdateResult;
use crate::transfer::TransferClient;

use endpoint::{verify_download, Endpoint};

pub use configuration::{Configuration, ProtocolVersion, Scheme, DEFAULT_HOST};
pub use digest::{file_md5, MISSING_FILE_DIGEST};
pub use install::{decode_and_install, read_trailer, GzipTrailer};
pub use protocol::{Protocol, LEGACY_LICENSE_KEY_MAX_LEN};
pub use scratch::{ScratchDir, ScratchSpace, TempScratchSpace};

/// Name of the streamed download inside the scratch directory.
const DOWNLOAD_FILE_NAME: &str = "downloaded";

const FILENAME_PATH: &str = "app/update_getfilename";

/// Keeps one database file in sync with the update host.
pub struct Updater {
    configuration: Configuration,
    client: Arc<dyn TransferClient>,
    scratch: Arc<dyn ScratchSpace>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl Updater {
    /// Create an updater using system temp directories and no cache.
    pub fn new(configuration: Configuration, client: Arc<dyn TransferClient>) -> Self {
        Self {
            configuration,
            client,
            scratch: Arc::new(TempScratchSpace::new()),
            cache: None,
        }
    }

    pub fn with_scratch_space(mut self, scratch: Arc<dyn ScratchSpace>) -> Self {
        self.scratch = scratch;
        self
    }

    /// Cache the public IP and remote filename lookups.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The protocol [`update`](Self::update) will speak.
    pub fn protocol(&self) -> Protocol {
        Protocol::select(&self.configuration)
    }

    /// MD5 of the installed database, or [`MISSING_FILE_DIGEST`].
    ///
    /// Never cached: computed from disk on each call.
    pub fn local_digest(&self) -> UpdateResult<String> {
        let path = self.configuration.require_database_path()?;
        digest::local_digest(path)
    }

    /// GET a `text/plain` resource from the update host.
    pub fn text_request(&self, path: &str, query: &str) -> UpdateResult<String> {
        self.endpoint().text_request(path, query)
    }

    /// Remote filename of the configured product, e.g. `GeoLite2-City.mmdb`.
    pub fn resolved_filename(&self) -> UpdateResult<String> {
        let product_id = self.configuration.require_product_id()?;
        let endpoint = self.endpoint();
        endpoint.cached(&filename_key(product_id), || {
            endpoint.text_request(
                FILENAME_PATH,
                &format!("product_id={}", urlencoding::encode(product_id)),
            )
        })
    }

    /// Check for a newer database and install it.
    ///
    /// Returns `true` if a new file was installed, `false` if the local copy
    /// is current. The installed file is either left as it was or replaced
    /// by a fully verified one.
    pub fn update(&self) -> UpdateResult<bool> {
        let protocol = self.protocol();
        self.configuration.require_credentials()?;
        let destination = self.configuration.require_database_path()?;
        self.configuration.require_product_id()?;

        let local_digest = self.local_digest()?;
        tracing::debug!(
            path = %destination.display(),
            digest = %local_digest,
            protocol = %protocol,
            "Checking for database update"
        );

        let scratch = self.scratch.create()?;
        let download = scratch.file(DOWNLOAD_FILE_NAME);
        let endpoint = self.endpoint();
        let negotiation = protocol.negotiate(&endpoint, &local_digest, &download)?;

        if !negotiation.update_needed {
            tracing::info!(path = %destination.display(), "Database is up to date");
            return Ok(false);
        }

        let downloaded = verify_download(&negotiation.response, &download)?;
        let installed = decode_and_install(&download, destination)?;

        tracing::info!(
            path = %destination.display(),
            downloaded,
            installed,
            "Database updated"
        );
        Ok(true)
    }

    fn endpoint(&self) -> Endpoint<'_> {
        Endpoint::new(
            &self.configuration,
            self.client.as_ref(),
            self.cache.as_deref(),
        )
    }
}
