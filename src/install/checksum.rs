//! Optional SHA-256 verification of downloaded artifacts
//!
//! Verification only runs when the caller supplies an expected digest.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::error::{InstallError, Result};

/// Hex-encoded SHA-256 of the file at `path`
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare the artifact digest against `expected` (case-insensitive)
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        log::debug!("Checksum verified for {}", path.display());
        return Ok(());
    }
    Err(InstallError::ChecksumMismatch {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        expected: expected.trim().to_ascii_lowercase(),
        actual,
    })
}
