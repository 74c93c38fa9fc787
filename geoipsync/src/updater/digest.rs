//! MD5 digests of the installed database.
//!
//! The update protocols identify the local copy by its MD5, hex-encoded in
//! lowercase. A missing file is reported with an all-zero sentinel that the
//! server recognises as "nothing installed".

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::{UpdateError, UpdateResult};

/// Digest sent when no local database exists.
pub const MISSING_FILE_DIGEST: &str = "00000000000000000000000000000000";

/// Buffer size for reading files during digest calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the MD5 of a file.
///
/// # Errors
///
/// Returns [`UpdateError::ReadFailed`] if the file cannot be opened or read.
pub fn file_md5(path: &Path) -> UpdateResult<String> {
    let mut file = File::open(path).map_err(|e| UpdateError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| UpdateError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// MD5 of an in-memory string, used for the legacy challenge.
pub fn text_md5(text: &str) -> String {
    format!("{:x}", Md5::digest(text.as_bytes()))
}

/// Digest of the database at `path`, or [`MISSING_FILE_DIGEST`] if nothing is there.
///
/// Only a regular file counts as installed. A file that exists but cannot be
/// read is a configuration problem, not a reason to download again.
pub fn local_digest(path: &Path) -> UpdateResult<String> {
    match path.metadata() {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(MISSING_FILE_DIGEST.to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(MISSING_FILE_DIGEST.to_string())
        }
        Err(e) => {
            return Err(UpdateError::UnreadableDatabase {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    file_md5(path).map_err(|e| match e {
        UpdateError::ReadFailed { path, source } => {
            UpdateError::UnreadableDatabase { path, source }
        }
        other => other,
    })
}

/// Whether a server-reported digest names the same file as `local`.
pub fn digests_match(remote: &str, local: &str) -> bool {
    remote.trim().eq_ignore_ascii_case(local)
}
