//! CLI error type.

use std::fmt;
use std::io;

use geoipsync::config::ConfigError;
use geoipsync::UpdateError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file or argument problem
    Config(String),
    /// The update attempt failed
    Update(UpdateError),
    /// Terminal or file I/O failed
    Io(io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Update(e) if e.is_user_facing() => write!(f, "{}", e),
            CliError::Update(e) => write!(f, "Update failed: {}", e),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Update(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::Config(_) => None,
        }
    }
}

impl From<UpdateError> for CliError {
    fn from(e: UpdateError) -> Self {
        CliError::Update(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
