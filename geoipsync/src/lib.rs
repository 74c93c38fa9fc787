//! geoipsync - keeps a local GeoIP2 database file in sync with its update host
//!
//! The library negotiates with the update server using either the legacy
//! challenge protocol or the basic-auth protocol, streams the gzip download
//! to a private scratch directory, verifies it, and atomically replaces the
//! installed database.
//!
//! # Modules
//!
//! - [`updater`]: the [`Updater`] and its protocols
//! - [`transfer`]: HTTP seam ([`TransferClient`]) and its reqwest implementation
//! - [`cache`]: optional store for the public IP and filename lookups
//! - [`config`]: INI configuration file used by the command-line tool
//! - [`error`]: error type shared by every operation

pub mod cache;
pub mod config;
pub mod error;
pub mod transfer;
pub mod updater;

pub use cache::{CacheStore, MemoryCacheStore};
pub use error::{ErrorKind, UpdateError, UpdateResult};
pub use transfer::{HttpTransferClient, TransferClient, TransferRequest, TransferResponse};
pub use updater::{Configuration, Protocol, ProtocolVersion, Scheme, Updater};

/// Version of the geoipsync library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
