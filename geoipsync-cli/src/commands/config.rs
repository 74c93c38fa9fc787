//! Configuration management CLI commands.
//!
//! `config get`, `config set`, `config list` and `config path` read and
//! modify the INI file used by the update command.

use std::path::Path;

use clap::Subcommand;
use geoipsync::config::{config_file_path, ConfigFile, ConfigKey};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., updater.product_id)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., updater.product_id)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(config_path: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(config_path, &key),
        ConfigCommands::Set { key, value } => run_set(config_path, &key, &value),
        ConfigCommands::List => run_list(config_path),
        ConfigCommands::Path => run_path(config_path),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'geoipsync config list' to see available keys.",
            key
        ))
    })
}

fn run_get(config_path: Option<&Path>, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = load_config(config_path)?;

    let value = config_key.get(&config);
    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let mut config = load_config(config_path)?;

    config_key.set(&mut config, value)?;
    config.save()?;

    println!("Set {} = {}", config_key, shown_value(config_key, &config));
    Ok(())
}

fn run_list(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    print!("{}", render_settings(&config));
    Ok(())
}

fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    println!("{}", path.display());
    Ok(())
}

/// Format every setting grouped by section. The license key is masked.
fn render_settings(config: &ConfigFile) -> String {
    let mut out = String::from("Configuration Settings\n======================\n");
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            out.push_str(&format!("\n[{}]\n", section));
            current_section = section;
        }

        out.push_str(&format!("  {} = {}\n", key.key_name(), shown_value(*key, config)));
    }
    out
}

/// Value as printed to the terminal, with the license key masked.
fn shown_value(key: ConfigKey, config: &ConfigFile) -> String {
    let value = key.get(config);
    if value.is_empty() {
        "(not set)".to_string()
    } else if key == ConfigKey::UpdaterLicenseKey {
        mask(&value)
    } else {
        value
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}{}", visible, "*".repeat(secret.chars().count().saturating_sub(4)))
}
