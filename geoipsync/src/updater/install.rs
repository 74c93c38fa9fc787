//! Gzip verification and atomic installation.
//!
//! A downloaded database is only installed once it has been fully
//! decompressed and checked against the gzip trailer:
//!
//! 1. The file must start with the gzip magic and be long enough to carry a
//!    header and trailer.
//! 2. The deflate stream is inflated in fixed-size chunks into a staging file
//!    created next to the destination (same filesystem, so the final rename
//!    is atomic).
//! 3. The number of bytes produced must equal ISIZE (size mod 2^32) and the
//!    CRC-32 must match.
//! 4. The staging file is renamed over the destination.
//!
//! Any failure drops the staging file, leaving the destination as it was.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::bufread::DeflateDecoder;
use flate2::Crc;
use tempfile::NamedTempFile;

use crate::error::{UpdateError, UpdateResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const CM_DEFLATE: u8 = 8;
const FLAG_HCRC: u8 = 0x02;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_COMMENT: u8 = 0x10;
const FLAG_RESERVED: u8 = 0xe0;

/// 10-byte member header plus 8-byte trailer.
const MIN_GZIP_LEN: u64 = 18;

/// Chunk size for inflating (64KB).
const CHUNK_SIZE: usize = 64 * 1024;

/// The last 8 bytes of a gzip member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipTrailer {
    pub crc32: u32,
    /// Uncompressed size modulo 2^32.
    pub isize: u32,
}

/// Check the gzip magic of `path` and read its trailer.
pub fn read_trailer(path: &Path) -> UpdateResult<GzipTrailer> {
    let read_failed = |e: io::Error| UpdateError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let invalid = || UpdateError::InvalidGzip {
        path: path.to_path_buf(),
    };

    let mut file = File::open(path).map_err(read_failed)?;
    let len = file.metadata().map_err(read_failed)?.len();
    if len < MIN_GZIP_LEN {
        return Err(invalid());
    }

    let mut magic = [0u8; 2];
    file.read_exact(&mut magic).map_err(read_failed)?;
    if magic != GZIP_MAGIC {
        return Err(invalid());
    }

    let mut trailer = [0u8; 8];
    file.seek(SeekFrom::End(-8)).map_err(read_failed)?;
    file.read_exact(&mut trailer).map_err(read_failed)?;

    Ok(GzipTrailer {
        crc32: u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]),
        isize: u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]),
    })
}

/// Decompress `compressed` and atomically replace `destination` with the result.
///
/// Returns the number of decompressed bytes installed.
///
/// # Errors
///
/// - [`UpdateError::InvalidGzip`] for a bad header or corrupt deflate data
/// - [`UpdateError::DecompressedSizeMismatch`] when the output length
///   disagrees with ISIZE
/// - [`UpdateError::CrcMismatch`] when the output checksum disagrees
/// - filesystem errors for staging, writing or renaming
pub fn decode_and_install(compressed: &Path, destination: &Path) -> UpdateResult<u64> {
    let trailer = read_trailer(compressed)?;

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| UpdateError::CreateDirFailed {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let file = File::open(compressed).map_err(|e| UpdateError::ReadFailed {
        path: compressed.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    skip_header(&mut reader).map_err(|e| classify_read_error(compressed, e))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".geoipsync-")
        .tempfile_in(parent)
        .map_err(|e| UpdateError::WriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;

    let (written, crc) = inflate(reader, &mut staged, compressed)?;

    if written & 0xffff_ffff != u64::from(trailer.isize) {
        return Err(UpdateError::DecompressedSizeMismatch {
            expected: u64::from(trailer.isize),
            actual: written,
        });
    }
    if crc != trailer.crc32 {
        return Err(UpdateError::CrcMismatch {
            expected: trailer.crc32,
            actual: crc,
        });
    }

    staged.as_file().sync_all().map_err(|e| UpdateError::WriteFailed {
        path: staged.path().to_path_buf(),
        source: e,
    })?;
    apply_permissions(&staged, destination)?;

    staged.persist(destination).map_err(|e| UpdateError::RenameFailed {
        from: e.file.path().to_path_buf(),
        to: destination.to_path_buf(),
        source: e.error,
    })?;

    tracing::debug!(
        destination = %destination.display(),
        bytes = written,
        "Installed decompressed database"
    );
    Ok(written)
}

/// Inflate the deflate body into `out`, returning byte count and CRC-32.
fn inflate<R: BufRead>(
    reader: R,
    out: &mut NamedTempFile,
    compressed: &Path,
) -> UpdateResult<(u64, u32)> {
    let out_path = out.path().to_path_buf();
    let mut decoder = DeflateDecoder::new(reader);
    let mut writer = BufWriter::new(out.as_file_mut());
    let mut crc = Crc::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let bytes_read = decoder
            .read(&mut buffer)
            .map_err(|e| classify_read_error(compressed, e))?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| UpdateError::WriteFailed {
                path: out_path.clone(),
                source: e,
            })?;

        crc.update(&buffer[..bytes_read]);
        written += bytes_read as u64;
    }

    writer.flush().map_err(|e| UpdateError::WriteFailed {
        path: out_path,
        source: e,
    })?;

    Ok((written, crc.sum()))
}

/// Give the staged file the destination's current permissions, or 0644 for a new file.
fn apply_permissions(staged: &NamedTempFile, destination: &Path) -> UpdateResult<()> {
    let permissions = match fs::metadata(destination) {
        Ok(meta) => meta.permissions(),
        Err(_) => default_permissions(staged)?,
    };
    fs::set_permissions(staged.path(), permissions).map_err(|e| UpdateError::WriteFailed {
        path: staged.path().to_path_buf(),
        source: e,
    })
}

#[cfg(unix)]
fn default_permissions(_staged: &NamedTempFile) -> UpdateResult<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(staged: &NamedTempFile) -> UpdateResult<fs::Permissions> {
    staged
        .as_file()
        .metadata()
        .map(|m| m.permissions())
        .map_err(|e| UpdateError::ReadFailed {
            path: staged.path().to_path_buf(),
            source: e,
        })
}

/// Consume the member header (RFC 1952 section 2.3).
fn skip_header<R: BufRead>(reader: &mut R) -> io::Result<()> {
    let mut fixed = [0u8; 10];
    reader.read_exact(&mut fixed)?;
    if fixed[..2] != GZIP_MAGIC || fixed[2] != CM_DEFLATE || fixed[3] & FLAG_RESERVED != 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad gzip header"));
    }
    let flags = fixed[3];

    if flags & FLAG_EXTRA != 0 {
        let mut xlen = [0u8; 2];
        reader.read_exact(&mut xlen)?;
        let xlen = u64::from(u16::from_le_bytes(xlen));
        let skipped = io::copy(&mut (&mut *reader).take(xlen), &mut io::sink())?;
        if skipped != xlen {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
    if flags & FLAG_NAME != 0 {
        skip_zero_terminated(reader)?;
    }
    if flags & FLAG_COMMENT != 0 {
        skip_zero_terminated(reader)?;
    }
    if flags & FLAG_HCRC != 0 {
        let mut header_crc = [0u8; 2];
        reader.read_exact(&mut header_crc)?;
    }
    Ok(())
}

fn skip_zero_terminated<R: BufRead>(reader: &mut R) -> io::Result<()> {
    let mut field = Vec::new();
    reader.read_until(0, &mut field)?;
    if field.last() != Some(&0) {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Corrupt or truncated data is an integrity failure; anything else is I/O.
fn classify_read_error(path: &Path, e: io::Error) -> UpdateError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            UpdateError::InvalidGzip {
                path: path.to_path_buf(),
            }
        }
        _ => UpdateError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use flate2::write::GzEncoder;
    use flate2::{Compression, GzBuilder};
    use tempfile::TempDir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn sample_data() -> Vec<u8> {
        (0..200_000u32).map(|i| (i % 251) as u8).collect()
    }

    /// Files in `dir` other than the ones named.
    fn stray_files(dir: &Path, expected: &[&str]) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| !expected.contains(&name.as_str()))
            .collect()
    }

    #[test]
    fn test_read_trailer() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("db.gz");
        fs::write(&gz, gzip(b"hello world")).unwrap();

        let trailer = read_trailer(&gz).unwrap();
        assert_eq!(trailer.isize, 11);
    }

    #[test]
    fn test_install_new_file() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("nested").join("GeoLite2-City.mmdb");
        let data = sample_data();
        fs::write(&gz, gzip(&data)).unwrap();

        let written = decode_and_install(&gz, &dest).unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), data);
    }

    #[test]
    fn test_install_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");
        fs::write(&dest, b"old database").unwrap();
        fs::write(&gz, gzip(b"new database")).unwrap();

        decode_and_install(&gz, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new database");
        assert!(stray_files(temp.path(), &["downloaded", "db.mmdb"]).is_empty());
    }

    #[test]
    fn test_header_with_optional_fields() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");

        let mut encoder = GzBuilder::new()
            .filename("GeoLite2-City.mmdb")
            .comment("weekly build")
            .extra(vec![1, 2, 3, 4])
            .write(Vec::new(), Compression::fast());
        encoder.write_all(b"payload with header fields").unwrap();
        fs::write(&gz, encoder.finish().unwrap()).unwrap();

        decode_and_install(&gz, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload with header fields");
    }

    #[test]
    fn test_corrupted_size_trailer_leaves_destination_untouched() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");
        fs::write(&dest, b"previous database contents").unwrap();

        let data = sample_data();
        let mut compressed = gzip(&data);
        let n = compressed.len();
        compressed[n - 4..].copy_from_slice(&(data.len() as u32 + 1).to_le_bytes());
        fs::write(&gz, compressed).unwrap();

        let err = decode_and_install(&gz, &dest).unwrap_err();

        match err {
            UpdateError::DecompressedSizeMismatch { expected, actual } => {
                assert_eq!(expected, data.len() as u64 + 1);
                assert_eq!(actual, data.len() as u64);
            }
            other => panic!("Expected DecompressedSizeMismatch, got {:?}", other),
        }
        assert_eq!(fs::read(&dest).unwrap(), b"previous database contents");
        assert!(stray_files(temp.path(), &["downloaded", "db.mmdb"]).is_empty());
    }

    #[test]
    fn test_corrupted_crc_is_rejected() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");

        let mut compressed = gzip(b"hello world");
        let n = compressed.len();
        compressed[n - 8] ^= 0xff;
        fs::write(&gz, compressed).unwrap();

        let err = decode_and_install(&gz, &dest).unwrap_err();
        assert!(matches!(err, UpdateError::CrcMismatch { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_invalid_magic() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");
        fs::write(&gz, b"this is plainly not a gzip stream at all").unwrap();

        let err = decode_and_install(&gz, &dest).unwrap_err();
        assert!(matches!(err, UpdateError::InvalidGzip { .. }));
        assert!(err.to_string().contains("not a valid gzip stream"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_too_short_for_trailer() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        fs::write(&gz, [0x1f, 0x8b, 0x08]).unwrap();

        let err = read_trailer(&gz).unwrap_err();
        assert!(matches!(err, UpdateError::InvalidGzip { .. }));
    }

    #[test]
    fn test_truncated_stream_leaves_destination_untouched() {
        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");
        fs::write(&dest, b"keep me").unwrap();

        let compressed = gzip(&sample_data());
        let mut truncated = compressed[..compressed.len() / 2].to_vec();
        truncated.extend_from_slice(&compressed[compressed.len() - 8..]);
        fs::write(&gz, truncated).unwrap();

        let err = decode_and_install(&gz, &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
        assert!(stray_files(temp.path(), &["downloaded", "db.mmdb"]).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let gz = temp.path().join("downloaded");
        let dest = temp.path().join("db.mmdb");
        fs::write(&gz, gzip(b"data")).unwrap();

        decode_and_install(&gz, &dest).unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
