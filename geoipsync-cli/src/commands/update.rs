//! Update and filename commands.

use std::io::{self, Write};
use std::path::Path;

use super::common::{build_updater, load_config, UpdaterArgs};
use crate::error::CliError;

/// Run the update command.
///
/// Prints one outcome line on stdout; diagnostics go to the log on stderr.
pub fn run(config_path: Option<&Path>, args: UpdaterArgs) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let updater = build_updater(&config, &args)?;

    let path = updater.configuration().database_path().display().to_string();
    let updated = updater.update()?;

    let mut stdout = io::stdout().lock();
    if updated {
        writeln!(stdout, "Updated {}", path)?;
    } else {
        writeln!(stdout, "{} is already up to date", path)?;
    }
    Ok(())
}

/// Run the filename command.
pub fn run_filename(config_path: Option<&Path>, args: UpdaterArgs) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let updater = build_updater(&config, &args)?;

    let filename = updater.resolved_filename()?;
    writeln!(io::stdout().lock(), "{}", filename)?;
    Ok(())
}
