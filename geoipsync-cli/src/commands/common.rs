//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use geoipsync::config::ConfigFile;
use geoipsync::transfer::DEFAULT_TIMEOUT_SECS;
use geoipsync::updater::ProtocolVersion;
use geoipsync::{Configuration, HttpTransferClient, MemoryCacheStore, Updater};

use crate::error::CliError;

/// Per-run overrides for settings from the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct UpdaterArgs {
    /// Product (edition) ID, e.g. GeoLite2-City
    #[arg(long)]
    pub product_id: Option<String>,

    /// Path of the installed database file
    #[arg(long)]
    pub database_path: Option<PathBuf>,

    /// Protocol version: 1, 2 or auto
    #[arg(long)]
    pub protocol_version: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Do not cache the public IP and filename lookups
    #[arg(long)]
    pub no_cache: bool,
}

/// Load the config file from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Resolve the updater configuration: CLI takes precedence, then config.
pub fn resolve_configuration(
    config: &ConfigFile,
    args: &UpdaterArgs,
) -> Result<Configuration, CliError> {
    let mut configuration = config.to_configuration()?;

    if let Some(product_id) = &args.product_id {
        configuration = configuration.with_product_id(product_id);
    }
    if let Some(path) = &args.database_path {
        configuration = configuration.with_database_path(path);
    }
    if let Some(version) = &args.protocol_version {
        configuration = configuration.with_protocol_version(ProtocolVersion::parse_setting(version)?);
    }

    Ok(configuration)
}

/// Build an updater wired to the real HTTP client.
pub fn build_updater(config: &ConfigFile, args: &UpdaterArgs) -> Result<Updater, CliError> {
    let configuration = resolve_configuration(config, args)?;
    let timeout = Duration::from_secs(args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let client = HttpTransferClient::with_timeout(timeout)?;

    let mut updater = Updater::new(configuration, Arc::new(client));
    if config.cache.enabled && !args.no_cache {
        updater = updater.with_cache(Arc::new(MemoryCacheStore::new()));
    }

    tracing::info!(protocol = %updater.protocol(), "Updater ready");
    Ok(updater)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let mut config = ConfigFile::default();
        config.updater.product_id = "GeoLite2-City".to_string();
        config.updater.database_path = "/var/lib/geoip/City.mmdb".to_string();

        let args = UpdaterArgs {
            product_id: Some("GeoLite2-ASN".to_string()),
            database_path: Some(PathBuf::from("/tmp/ASN.mmdb")),
            protocol_version: Some("1".to_string()),
            ..Default::default()
        };
        let configuration = resolve_configuration(&config, &args).unwrap();

        assert_eq!(configuration.product_id(), "GeoLite2-ASN");
        assert_eq!(configuration.database_path(), Path::new("/tmp/ASN.mmdb"));
        assert_eq!(configuration.protocol_version(), Some(ProtocolVersion::V1));
    }

    #[test]
    fn test_config_used_without_overrides() {
        let mut config = ConfigFile::default();
        config.updater.product_id = "GeoLite2-City".to_string();

        let configuration = resolve_configuration(&config, &UpdaterArgs::default()).unwrap();
        assert_eq!(configuration.product_id(), "GeoLite2-City");
        assert_eq!(configuration.protocol_version(), None);
    }

    #[test]
    fn test_bad_protocol_version_override() {
        let args = UpdaterArgs {
            protocol_version: Some("7".to_string()),
            ..Default::default()
        };
        let err = resolve_configuration(&ConfigFile::default(), &args).unwrap_err();
        assert!(matches!(err, CliError::Update(_)));
    }
}
