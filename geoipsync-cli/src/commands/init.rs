//! Init command - initialize configuration file.

use std::path::Path;

use super::common::load_config;
use crate::error::CliError;

/// Write the configuration file, keeping any values already set.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let existed = config.origin().is_some_and(Path::exists);
    config.save()?;

    let path = config
        .origin()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if existed {
        println!("Configuration file already exists: {}", path);
    } else {
        println!("Created configuration file: {}", path);
    }
    println!();
    println!("Next steps:");
    println!("  geoipsync config set updater.user_id <account id>");
    println!("  geoipsync config set updater.license_key <license key>");
    println!("  geoipsync config set updater.product_id GeoLite2-City");
    println!("  geoipsync config set updater.database_path <path to .mmdb file>");
    Ok(())
}
