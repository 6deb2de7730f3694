//! SHA256 verification of downloaded archives.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{LauncherError, Result};

/// Buffer size for reading files during checksum computation.
const BUFFER_SIZE: usize = 65536; // 64 KB

/// Compute the SHA256 hash of a file as lowercase hex.
pub fn compute_file_sha256(path: &Path) -> Result<String> {
    debug!("Computing SHA256 for: {}", path.display());

    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Normalize a published digest: `sha256:` prefix and case are ignored.
#[must_use]
pub fn normalize_digest(digest: &str) -> String {
    let trimmed = digest.trim();
    trimmed
        .strip_prefix("sha256:")
        .unwrap_or(trimmed)
        .trim()
        .to_ascii_lowercase()
}

/// Verify that the file at `path` hashes to `expected`.
///
/// Returns the verified hash.
pub fn verify_file_sha256(path: &Path, expected: &str) -> Result<String> {
    let expected = normalize_digest(expected);
    let actual = compute_file_sha256(path)?;

    if actual != expected {
        return Err(LauncherError::ChecksumMismatch { expected, actual });
    }

    info!("SHA256 verification passed: {}", actual);
    Ok(actual)
}
