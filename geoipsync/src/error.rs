//! Error types for the database updater.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for updater operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Broad classification of an [`UpdateError`].
///
/// Callers use this to decide how to present a failure: configuration and
/// credential problems are meant for the person running the updater, the
/// rest are diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required setting is missing or malformed.
    Configuration,
    /// The user ID or license key is not configured.
    Credential,
    /// The server answered with something the protocol does not allow.
    Protocol,
    /// The HTTP exchange itself failed.
    Transfer,
    /// Downloaded data failed a size or format check.
    Integrity,
    /// A local file operation failed.
    Filesystem,
}

/// Errors that can occur while synchronizing the database file.
#[derive(Debug)]
pub enum UpdateError {
    /// A configuration value was rejected by its setter.
    InvalidArgument { field: &'static str, value: String },

    /// A required configuration value is empty.
    MissingSetting { field: &'static str },

    /// The local database exists but could not be read.
    UnreadableDatabase { path: PathBuf, source: io::Error },

    /// User ID or license key are not configured.
    MissingCredential(&'static str),

    /// Unexpected response from the update server.
    Protocol(String),

    /// HTTP request failed before a response was received.
    Transfer { url: String, reason: String },

    /// Network timeout.
    Timeout { url: String, timeout_secs: u64 },

    /// The server sent an empty body for an update.
    EmptyDownload,

    /// Received byte count differs from the advertised content length.
    LengthMismatch { expected: u64, actual: u64 },

    /// Downloaded file does not carry the gzip magic bytes.
    InvalidGzip { path: PathBuf },

    /// Decompressed size differs from the gzip ISIZE trailer.
    DecompressedSizeMismatch { expected: u64, actual: u64 },

    /// CRC-32 of the decompressed data differs from the gzip trailer.
    CrcMismatch { expected: u32, actual: u32 },

    /// Failed to read a file.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to move the verified file into place.
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

impl UpdateError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. }
            | Self::MissingSetting { .. }
            | Self::UnreadableDatabase { .. } => ErrorKind::Configuration,
            Self::MissingCredential(_) => ErrorKind::Credential,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Transfer { .. } | Self::Timeout { .. } => ErrorKind::Transfer,
            Self::EmptyDownload
            | Self::LengthMismatch { .. }
            | Self::InvalidGzip { .. }
            | Self::DecompressedSizeMismatch { .. }
            | Self::CrcMismatch { .. } => ErrorKind::Integrity,
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::RenameFailed { .. } => ErrorKind::Filesystem,
        }
    }

    /// Whether the message is addressed to the person configuring the updater.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Credential
        )
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { field, value } => {
                write!(f, "invalid value for {}: {:?}", field, value)
            }
            Self::MissingSetting { field } => {
                write!(f, "the {} setting is not configured", field)
            }
            Self::UnreadableDatabase { path, source } => {
                write!(
                    f,
                    "the database file {} exists but cannot be read: {}",
                    path.display(),
                    source
                )
            }
            Self::MissingCredential(what) => write!(f, "the {} is not configured", what),
            Self::Protocol(msg) => write!(f, "unexpected server response: {}", msg),
            Self::Transfer { url, reason } => write!(f, "request to {} failed: {}", url, reason),
            Self::Timeout { url, timeout_secs } => {
                write!(f, "request to {} timed out after {}s", url, timeout_secs)
            }
            Self::EmptyDownload => write!(f, "no data downloaded"),
            Self::LengthMismatch { expected, actual } => {
                write!(
                    f,
                    "invalid size of downloaded data: expected {} bytes, received {}",
                    expected, actual
                )
            }
            Self::InvalidGzip { path } => {
                write!(f, "{} is not a valid gzip stream", path.display())
            }
            Self::DecompressedSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "decompressed data size mismatch: expected {} bytes, got {}",
                    expected, actual
                )
            }
            Self::CrcMismatch { expected, actual } => {
                write!(
                    f,
                    "decompressed data checksum mismatch: expected {:08x}, got {:08x}",
                    expected, actual
                )
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::RenameFailed { from, to, source } => {
                write!(
                    f,
                    "failed to move {} to {}: {}",
                    from.display(),
                    to.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for UpdateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnreadableDatabase { source, .. } => Some(source),
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::RenameFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
