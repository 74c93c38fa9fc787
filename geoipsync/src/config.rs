//! Configuration file handling.
//!
//! Settings are stored in an INI file at `~/.config/geoipsync/config.ini`
//! (or the platform equivalent):
//!
//! ```ini
//! [updater]
//! host = updates.maxmind.com
//! protocol = https
//! user_id = 123456
//! license_key = 0123456789abcdef0123
//! product_id = GeoLite2-City
//! database_path = GeoLite2-City.mmdb
//! protocol_version = auto
//!
//! [cache]
//! enabled = true
//! ```
//!
//! A relative `database_path` is resolved against the directory holding the
//! config file.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::error::{UpdateError, UpdateResult};
use crate::updater::{Configuration, ProtocolVersion, Scheme, DEFAULT_HOST};

const UPDATER_SECTION: &str = "updater";
const CACHE_SECTION: &str = "cache";

/// Errors from reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// `[updater]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterSettings {
    pub host: String,
    pub protocol: Scheme,
    pub user_id: Option<u64>,
    pub license_key: String,
    pub product_id: String,
    /// Raw path as written in the file; may be relative.
    pub database_path: String,
    pub protocol_version: Option<ProtocolVersion>,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            protocol: Scheme::default(),
            user_id: None,
            license_key: String::new(),
            product_id: String::new(),
            database_path: String::new(),
            protocol_version: None,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Cache the public IP and remote filename lookups in memory.
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub updater: UpdaterSettings,
    pub cache: CacheSettings,
    /// File this configuration was loaded from, if any.
    origin: Option<PathBuf>,
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geoipsync")
        .join("config.ini")
}

impl ConfigFile {
    /// Load from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    ///
    /// Values are validated the same way [`ConfigKey::set`] validates them,
    /// so a file edited by hand cannot smuggle in a bad host or user ID.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = ConfigFile {
            origin: Some(path.to_path_buf()),
            ..Default::default()
        };
        if !path.exists() {
            return Ok(config);
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the file this configuration came from, or the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.origin.clone().unwrap_or_else(config_file_path);
        self.save_to(&path)
    }

    /// Save to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source: io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(write_error)?;

        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Path the configuration was loaded from.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Database path with relative values anchored at the config directory.
    pub fn database_path(&self) -> PathBuf {
        let raw = Path::new(self.updater.database_path.trim());
        if raw.as_os_str().is_empty() || raw.is_absolute() {
            return raw.to_path_buf();
        }
        match self.origin.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(raw),
            None => raw.to_path_buf(),
        }
    }

    /// Build the updater configuration.
    pub fn to_configuration(&self) -> UpdateResult<Configuration> {
        let configuration = Configuration::new()
            .with_host(&self.updater.host)?
            .with_scheme(self.updater.protocol)
            .with_user_id(self.updater.user_id)?
            .with_license_key(&self.updater.license_key)
            .with_product_id(&self.updater.product_id)
            .with_database_path(self.database_path())
            .with_protocol_version(self.updater.protocol_version);
        Ok(configuration)
    }
}

/// A settable configuration key, named `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    UpdaterHost,
    UpdaterProtocol,
    UpdaterUserId,
    UpdaterLicenseKey,
    UpdaterProductId,
    UpdaterDatabasePath,
    UpdaterProtocolVersion,
    CacheEnabled,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::UpdaterHost,
            ConfigKey::UpdaterProtocol,
            ConfigKey::UpdaterUserId,
            ConfigKey::UpdaterLicenseKey,
            ConfigKey::UpdaterProductId,
            ConfigKey::UpdaterDatabasePath,
            ConfigKey::UpdaterProtocolVersion,
            ConfigKey::CacheEnabled,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::CacheEnabled => CACHE_SECTION,
            _ => UPDATER_SECTION,
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::UpdaterHost => "host",
            ConfigKey::UpdaterProtocol => "protocol",
            ConfigKey::UpdaterUserId => "user_id",
            ConfigKey::UpdaterLicenseKey => "license_key",
            ConfigKey::UpdaterProductId => "product_id",
            ConfigKey::UpdaterDatabasePath => "database_path",
            ConfigKey::UpdaterProtocolVersion => "protocol_version",
            ConfigKey::CacheEnabled => "enabled",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as it would be written to the file.
    pub fn get(&self, config: &ConfigFile) -> String {
        let updater = &config.updater;
        match self {
            ConfigKey::UpdaterHost => updater.host.clone(),
            ConfigKey::UpdaterProtocol => updater.protocol.to_string(),
            ConfigKey::UpdaterUserId => updater.user_id.map(|id| id.to_string()).unwrap_or_default(),
            ConfigKey::UpdaterLicenseKey => updater.license_key.clone(),
            ConfigKey::UpdaterProductId => updater.product_id.clone(),
            ConfigKey::UpdaterDatabasePath => updater.database_path.clone(),
            ConfigKey::UpdaterProtocolVersion => updater
                .protocol_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "auto".to_string()),
            ConfigKey::CacheEnabled => config.cache.enabled.to_string(),
        }
    }

    /// Validate `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: self.name(),
            reason,
        };
        let updater = &mut config.updater;

        match self {
            ConfigKey::UpdaterHost => {
                let validated = Configuration::new()
                    .with_host(value)
                    .map_err(|e| invalid(e.to_string()))?;
                updater.host = validated.host().to_string();
            }
            ConfigKey::UpdaterProtocol => {
                updater.protocol = value
                    .parse()
                    .map_err(|e: UpdateError| invalid(e.to_string()))?;
            }
            ConfigKey::UpdaterUserId => {
                let validated = Configuration::new()
                    .with_user_id_str(value)
                    .map_err(|e| invalid(e.to_string()))?;
                updater.user_id = validated.user_id();
            }
            ConfigKey::UpdaterLicenseKey => updater.license_key = value.trim().to_string(),
            ConfigKey::UpdaterProductId => updater.product_id = value.trim().to_string(),
            ConfigKey::UpdaterDatabasePath => updater.database_path = value.trim().to_string(),
            ConfigKey::UpdaterProtocolVersion => {
                updater.protocol_version =
                    ProtocolVersion::parse_setting(value).map_err(|e| invalid(e.to_string()))?;
            }
            ConfigKey::CacheEnabled => {
                config.cache.enabled = parse_bool(value)
                    .ok_or_else(|| invalid(format!("expected true or false, got '{}'", value)))?;
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.updater, UpdaterSettings::default());
        assert!(config.cache.enabled);
        assert_eq!(config.origin(), Some(path.as_path()));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        ConfigKey::UpdaterUserId.set(&mut config, "123456").unwrap();
        ConfigKey::UpdaterLicenseKey.set(&mut config, "abcdef012345").unwrap();
        ConfigKey::UpdaterProductId.set(&mut config, "GeoLite2-Country").unwrap();
        ConfigKey::UpdaterProtocolVersion.set(&mut config, "2").unwrap();
        ConfigKey::CacheEnabled.set(&mut config, "no").unwrap();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.updater.user_id, Some(123456));
        assert_eq!(loaded.updater.license_key, "abcdef012345");
        assert_eq!(loaded.updater.product_id, "GeoLite2-Country");
        assert_eq!(loaded.updater.protocol_version, Some(ProtocolVersion::V2));
        assert!(!loaded.cache.enabled);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[updater]\nhost = evil.example.com/path\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "updater.host"));
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!("updater.host".parse::<ConfigKey>().unwrap(), ConfigKey::UpdaterHost);
        assert_eq!("CACHE.enabled".parse::<ConfigKey>().unwrap(), ConfigKey::CacheEnabled);
        assert!(matches!(
            "updater.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_validates_like_configuration() {
        let mut config = ConfigFile::default();

        assert!(ConfigKey::UpdaterUserId.set(&mut config, "0").is_err());
        assert!(ConfigKey::UpdaterUserId.set(&mut config, "abc").is_err());
        assert!(ConfigKey::UpdaterProtocol.set(&mut config, "ftp").is_err());
        assert!(ConfigKey::UpdaterProtocolVersion.set(&mut config, "3").is_err());
        assert!(ConfigKey::CacheEnabled.set(&mut config, "maybe").is_err());

        ConfigKey::UpdaterHost.set(&mut config, "  mirror.example.com ").unwrap();
        assert_eq!(ConfigKey::UpdaterHost.get(&config), "mirror.example.com");

        ConfigKey::UpdaterUserId.set(&mut config, "").unwrap();
        assert_eq!(ConfigKey::UpdaterUserId.get(&config), "");

        ConfigKey::UpdaterProtocolVersion.set(&mut config, "auto").unwrap();
        assert_eq!(ConfigKey::UpdaterProtocolVersion.get(&config), "auto");
    }

    #[test]
    fn test_relative_database_path_uses_config_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[updater]\nuser_id = 42\nlicense_key = abc\nproduct_id = GeoIP2-City\ndatabase_path = db/GeoIP2-City.mmdb\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        let configuration = config.to_configuration().unwrap();
        assert_eq!(
            configuration.database_path(),
            temp.path().join("db").join("GeoIP2-City.mmdb")
        );
        assert_eq!(configuration.user_id(), Some(42));
        assert_eq!(configuration.host(), DEFAULT_HOST);
    }

    #[test]
    fn test_absolute_database_path_is_kept() {
        let temp = TempDir::new().unwrap();
        let absolute = temp.path().join("GeoIP2-City.mmdb");

        let mut config = ConfigFile::load_from(&temp.path().join("config.ini")).unwrap();
        config.updater.database_path = absolute.display().to_string();
        assert_eq!(config.database_path(), absolute);
    }
}
