//! Filesystem utilities for the repository cache.
//!
//! All writes into the local repository go through [`atomic_write_bytes`]:
//! content lands in a temporary file in the destination directory and is
//! atomically renamed into place, so concurrent readers never observe a
//! half-written artifact. [`calculate_checksum`] provides the SHA-256
//! digests used for up-to-date tracking and download verification.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;

/// Ensure a directory exists, creating it and all parents if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Atomically write `content` to `dest` via a sibling temp file and rename.
pub fn atomic_write_bytes(dest: &Path, content: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .with_context(|| format!("Destination has no parent directory: {}", dest.display()))?;
    ensure_dir(parent)?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    std::io::Write::write_all(&mut temp, content)
        .with_context(|| format!("Failed to write temp file for {}", dest.display()))?;
    temp.persist(dest)
        .with_context(|| format!("Failed to atomically rename into {}", dest.display()))?;
    Ok(())
}

/// Atomically copy `source` into `dest`. The source is read fully, then
/// written through the same temp-file-and-rename path as
/// [`atomic_write_bytes`].
pub fn atomic_copy(source: &Path, dest: &Path) -> Result<()> {
    let content =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    atomic_write_bytes(dest, &content)
}

/// SHA-256 digest of a file, hex encoded.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let content =
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(checksum_bytes(&content))
}

/// SHA-256 digest of a byte slice, hex encoded.
pub fn checksum_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
