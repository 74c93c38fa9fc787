//! Connection and product settings for the updater.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{UpdateError, UpdateResult};

/// Host serving the update endpoints unless configured otherwise.
pub const DEFAULT_HOST: &str = "updates.maxmind.com";

/// URL scheme used by the legacy protocol.
///
/// The token protocol always talks HTTPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            _ => Err(UpdateError::InvalidArgument {
                field: "protocol",
                value: s.to_string(),
            }),
        }
    }
}

/// Wire protocol generation spoken with the update host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Challenge-response protocol (`app/update_secure`).
    V1,
    /// Basic-auth conditional GET (`geoip/databases/.../update`).
    V2,
}

impl ProtocolVersion {
    pub fn number(&self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }

    /// Parse a textual setting: `1`, `2`, or `auto`/empty for inference.
    pub fn parse_setting(value: &str) -> UpdateResult<Option<Self>> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(None),
            "1" => Ok(Some(ProtocolVersion::V1)),
            "2" => Ok(Some(ProtocolVersion::V2)),
            _ => Err(UpdateError::InvalidArgument {
                field: "protocolVersion",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Settings for one database file.
///
/// Every `with_*` method validates its input and fails immediately with
/// [`UpdateError::InvalidArgument`]; getters never fail. Product ID and
/// database path may be left empty while building, they are only required
/// once a request is about to be made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    host: String,
    scheme: Scheme,
    user_id: Option<u64>,
    license_key: String,
    product_id: String,
    database_path: PathBuf,
    protocol_version: Option<ProtocolVersion>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            scheme: Scheme::default(),
            user_id: None,
            license_key: String::new(),
            product_id: String::new(),
            database_path: PathBuf::new(),
            protocol_version: None,
        }
    }
}

impl Configuration {
    /// Create a configuration with default host and scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the update host. Must be a bare host name, optionally with a port.
    pub fn with_host(mut self, host: impl AsRef<str>) -> UpdateResult<Self> {
        let raw = host.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
            return Err(UpdateError::InvalidArgument {
                field: "host",
                value: raw.to_string(),
            });
        }
        self.host = trimmed.to_string();
        Ok(self)
    }

    /// Set the URL scheme used by the legacy protocol.
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the account's user ID. Zero is rejected.
    pub fn with_user_id(mut self, user_id: Option<u64>) -> UpdateResult<Self> {
        if user_id == Some(0) {
            return Err(UpdateError::InvalidArgument {
                field: "userId",
                value: "0".to_string(),
            });
        }
        self.user_id = user_id;
        Ok(self)
    }

    /// Set the user ID from text. An empty string clears it.
    pub fn with_user_id_str(self, user_id: &str) -> UpdateResult<Self> {
        let trimmed = user_id.trim();
        if trimmed.is_empty() {
            return self.with_user_id(None);
        }
        let parsed = trimmed
            .parse::<u64>()
            .map_err(|_| UpdateError::InvalidArgument {
                field: "userId",
                value: user_id.to_string(),
            })?;
        self.with_user_id(Some(parsed))
    }

    /// Set the license key. Surrounding whitespace is dropped.
    pub fn with_license_key(mut self, license_key: impl AsRef<str>) -> Self {
        self.license_key = license_key.as_ref().trim().to_string();
        self
    }

    /// Set the product (edition) ID, e.g. `GeoLite2-City`.
    pub fn with_product_id(mut self, product_id: impl AsRef<str>) -> Self {
        self.product_id = product_id.as_ref().trim().to_string();
        self
    }

    /// Set the path of the installed database file.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.database_path = match path.to_str() {
            Some(s) => PathBuf::from(s.trim()),
            None => path,
        };
        self
    }

    /// Pin the protocol version; `None` infers it from the license key.
    pub fn with_protocol_version(mut self, version: Option<ProtocolVersion>) -> Self {
        self.protocol_version = version;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    pub fn license_key(&self) -> &str {
        &self.license_key
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.protocol_version
    }

    /// The database path, or a configuration error if it is empty.
    pub fn require_database_path(&self) -> UpdateResult<&Path> {
        if self.database_path.as_os_str().is_empty() {
            return Err(UpdateError::MissingSetting {
                field: "databasePath",
            });
        }
        Ok(&self.database_path)
    }

    /// The product ID, or a configuration error if it is empty.
    pub fn require_product_id(&self) -> UpdateResult<&str> {
        if self.product_id.is_empty() {
            return Err(UpdateError::MissingSetting { field: "productId" });
        }
        Ok(&self.product_id)
    }

    /// User ID and license key, or a credential error naming the missing one.
    pub fn require_credentials(&self) -> UpdateResult<(u64, &str)> {
        let user_id = self
            .user_id
            .ok_or(UpdateError::MissingCredential("user ID"))?;
        if self.license_key.is_empty() {
            return Err(UpdateError::MissingCredential("license key"));
        }
        Ok((user_id, &self.license_key))
    }
}
