//! Local artifact repository.
//!
//! Artifacts live under a root directory in the canonical layout
//! `group/artifact/baseVersion/artifact-version[-classifier].extension`, with
//! dots in the group id mapped to path separators. The directory level uses
//! the *base* version, so every timestamped build of a snapshot lands in the
//! same directory while the file name keeps the full version.
//!
//! Installation is safe under concurrency at two levels:
//!
//! - **In-process**: a per-coordinate async mutex serializes installs of the
//!   same artifact across tasks.
//! - **Cross-process**: an exclusive file lock under `.locks/` is held for the
//!   duration of the write. Lock acquisition happens on the blocking pool so
//!   the runtime is never stalled.
//!
//! Writes themselves are atomic (temp file plus rename), so readers never see
//! a partially installed artifact.

pub mod metadata;
pub mod remote;

use crate::artifact::ArtifactCoordinate;
use crate::core::MasonError;
use crate::utils::fs::{atomic_copy, atomic_write_bytes, calculate_checksum, ensure_dir};
use anyhow::{Context, Result};
use dashmap::DashMap;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Relative path of an artifact within a repository root.
pub fn layout_path(coordinate: &ArtifactCoordinate) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in coordinate.group_id.split('.') {
        path.push(segment);
    }
    path.push(&coordinate.artifact_id);
    path.push(coordinate.base_version());

    let mut file_name =
        format!("{}-{}", coordinate.artifact_id, coordinate.version);
    if let Some(classifier) = &coordinate.classifier {
        file_name.push('-');
        file_name.push_str(classifier);
    }
    file_name.push('.');
    file_name.push_str(&coordinate.extension);
    path.push(file_name);
    path
}

/// Exclusive cross-process lock over one artifact's install.
///
/// Held for the lifetime of the value; the OS lock is released on drop.
struct InstallLock {
    _file: File,
}

impl InstallLock {
    async fn acquire(root: &Path, key: &str) -> Result<Self> {
        let locks_dir = root.join(".locks");
        ensure_dir(&locks_dir)?;
        let lock_path = locks_dir.join(format!("{key}.lock"));

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path.display())
                })?;
            file.lock_exclusive().with_context(|| {
                format!("Failed to acquire lock: {}", lock_path.display())
            })?;
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        Ok(Self { _file: file })
    }
}

/// The local artifact repository rooted at a directory.
pub struct LocalRepository {
    root: PathBuf,
    install_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LocalRepository {
    /// Open a repository at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self { root, install_locks: DashMap::new() })
    }

    /// The repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path where `coordinate` lives in this repository.
    pub fn artifact_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.root.join(layout_path(coordinate))
    }

    /// Whether `coordinate` is present.
    pub fn contains(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.artifact_path(coordinate).is_file()
    }

    /// Path of an installed artifact, or [`MasonError::ArtifactNotFound`].
    pub fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf, MasonError> {
        let path = self.artifact_path(coordinate);
        if path.is_file() {
            Ok(path)
        } else {
            Err(MasonError::ArtifactNotFound {
                coordinate: coordinate.to_string(),
                searched: format!("local repository at {}", self.root.display()),
            })
        }
    }

    /// Install a file from the filesystem, skipping the copy when the
    /// destination is already up to date.
    pub async fn install(
        &self,
        coordinate: &ArtifactCoordinate,
        source: &Path,
    ) -> Result<PathBuf> {
        let dest = self.artifact_path(coordinate);
        let _guard = self.lock_coordinate(coordinate).await?;

        if is_up_to_date(source, &dest)? {
            debug!(artifact = %coordinate, "already up to date, skipping install");
            return Ok(dest);
        }

        atomic_copy(source, &dest)
            .with_context(|| format!("Failed to install {coordinate}"))?;
        info!(artifact = %coordinate, path = %dest.display(), "installed artifact");
        Ok(dest)
    }

    /// Install artifact content from memory, unconditionally.
    pub async fn install_bytes(
        &self,
        coordinate: &ArtifactCoordinate,
        content: &[u8],
    ) -> Result<PathBuf> {
        let dest = self.artifact_path(coordinate);
        let _guard = self.lock_coordinate(coordinate).await?;

        atomic_write_bytes(&dest, content)
            .with_context(|| format!("Failed to install {coordinate}"))?;
        info!(artifact = %coordinate, path = %dest.display(), "installed artifact");
        Ok(dest)
    }

    /// Acquire both the in-process and the cross-process lock for a
    /// coordinate. The returned pair keeps both alive.
    async fn lock_coordinate(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<(tokio::sync::OwnedMutexGuard<()>, InstallLock)> {
        let key = lock_key(coordinate);
        let mutex = self
            .install_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        let file_lock = InstallLock::acquire(&self.root, &key).await?;
        Ok((guard, file_lock))
    }
}

fn lock_key(coordinate: &ArtifactCoordinate) -> String {
    let mut key = format!(
        "{}-{}-{}",
        coordinate.group_id, coordinate.artifact_id, coordinate.version
    );
    if let Some(classifier) = &coordinate.classifier {
        key.push('-');
        key.push_str(classifier);
    }
    key.push('-');
    key.push_str(&coordinate.extension);
    key
}

/// A destination is up to date when it exists and either is at least as new
/// as the source or has identical content.
fn is_up_to_date(source: &Path, dest: &Path) -> Result<bool> {
    if !dest.is_file() {
        return Ok(false);
    }
    let source_meta = std::fs::metadata(source)
        .with_context(|| format!("Failed to stat {}", source.display()))?;
    let dest_meta = std::fs::metadata(dest)
        .with_context(|| format!("Failed to stat {}", dest.display()))?;

    if let (Ok(src_time), Ok(dest_time)) = (source_meta.modified(), dest_meta.modified())
        && src_time <= dest_time
    {
        return Ok(true);
    }
    // Modification times are inconclusive; content decides.
    Ok(calculate_checksum(source)? == calculate_checksum(dest)?)
}
