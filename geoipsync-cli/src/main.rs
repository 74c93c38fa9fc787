//! geoipsync CLI - keep a local GeoIP2 database up to date
//!
//! ```text
//! geoipsync init                       create the config file
//! geoipsync config set <key> <value>   edit settings
//! geoipsync update                     download and install a newer database
//! geoipsync filename                   print the product's remote filename
//! ```
//!
//! Logs go to stderr. Use `-v`/`-vv` or `RUST_LOG` to see more.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::common::UpdaterArgs;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "geoipsync", version, about = "Keep a local GeoIP2 database up to date")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the configuration file
    Init,

    /// Check for a newer database and install it
    Update(UpdaterArgs),

    /// Print the remote filename of the configured product
    Filename(UpdaterArgs),

    /// View or modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init => commands::init::run(config_path),
        Commands::Update(args) => commands::update::run(config_path, args),
        Commands::Filename(args) => commands::update::run_filename(config_path, args),
        Commands::Config { command } => commands::config::run(config_path, command),
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_with_overrides() {
        let cli = Cli::try_parse_from([
            "geoipsync",
            "-vv",
            "update",
            "--product-id",
            "GeoLite2-ASN",
            "--no-cache",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Update(args) => {
                assert_eq!(args.product_id.as_deref(), Some("GeoLite2-ASN"));
                assert!(args.no_cache);
            }
            other => panic!("Expected update command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from([
            "geoipsync",
            "--config",
            "/tmp/geoipsync.ini",
            "config",
            "set",
            "updater.user_id",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/geoipsync.ini")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }
}
