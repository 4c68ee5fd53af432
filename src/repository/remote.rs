//! Remote artifact repository access.
//!
//! A remote repository serves the same canonical layout as the local one over
//! HTTP. Downloads are retried with exponential backoff on transport and
//! server errors; a 404 is final and reported as [`MasonError::ArtifactNotFound`]
//! without retrying. When the repository publishes a `.sha256` sibling for an
//! artifact, the downloaded bytes are verified against it before install.

use super::{LocalRepository, layout_path};
use crate::artifact::ArtifactCoordinate;
use crate::core::MasonError;
use crate::utils::fs::checksum_bytes;
use anyhow::Result;
use std::path::PathBuf;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

/// A remote repository at an HTTP base URL.
pub struct RemoteRepository {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl RemoteRepository {
    /// Create a remote repository. A trailing slash on `base_url` is
    /// tolerated.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { name: name.into(), base_url, client: reqwest::Client::new() }
    }

    /// Repository name, used in error messages and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The URL an artifact is served from.
    pub fn artifact_url(&self, coordinate: &ArtifactCoordinate) -> String {
        format!("{}/{}", self.base_url, to_url_path(&layout_path(coordinate)))
    }

    /// Download an artifact, verifying its published checksum when one
    /// exists.
    pub async fn fetch(&self, coordinate: &ArtifactCoordinate) -> Result<Vec<u8>, MasonError> {
        let url = self.artifact_url(coordinate);
        let content = self.get_with_retry(&url, coordinate).await?;

        if let Some(expected) = self.fetch_checksum(&url).await {
            let actual = checksum_bytes(&content);
            if actual != expected {
                return Err(MasonError::ChecksumMismatch {
                    path: url,
                    expected,
                    actual,
                });
            }
            debug!(artifact = %coordinate, "checksum verified");
        }
        Ok(content)
    }

    /// Download an artifact and install it into `local`.
    pub async fn download_to(
        &self,
        coordinate: &ArtifactCoordinate,
        local: &LocalRepository,
    ) -> Result<PathBuf> {
        let content = self.fetch(coordinate).await?;
        info!(
            artifact = %coordinate,
            repository = %self.name,
            bytes = content.len(),
            "downloaded artifact"
        );
        local.install_bytes(coordinate, &content).await
    }

    /// Download a batch of artifacts concurrently into `local`.
    ///
    /// Per-coordinate locking in the local repository keeps overlapping
    /// installs safe; the first failure aborts the batch.
    pub async fn download_all(
        &self,
        coordinates: &[ArtifactCoordinate],
        local: &LocalRepository,
    ) -> Result<Vec<PathBuf>> {
        futures::future::try_join_all(
            coordinates.iter().map(|coordinate| self.download_to(coordinate, local)),
        )
        .await
    }

    /// GET with exponential backoff. A 404 is not retried.
    async fn get_with_retry(
        &self,
        url: &str,
        coordinate: &ArtifactCoordinate,
    ) -> Result<Vec<u8>, MasonError> {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        RetryIf::spawn(
            strategy,
            || self.get_once(url, coordinate),
            |err: &MasonError| {
                let transient = matches!(err, MasonError::RemoteFetchFailed { .. });
                if transient {
                    warn!(url, error = %err, "retrying download");
                }
                transient
            },
        )
        .await
    }

    async fn get_once(
        &self,
        url: &str,
        coordinate: &ArtifactCoordinate,
    ) -> Result<Vec<u8>, MasonError> {
        let response = self.client.get(url).send().await.map_err(|err| {
            MasonError::RemoteFetchFailed { url: url.to_string(), reason: err.to_string() }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MasonError::ArtifactNotFound {
                coordinate: coordinate.to_string(),
                searched: format!("remote repository '{}' ({})", self.name, self.base_url),
            });
        }
        if !response.status().is_success() {
            return Err(MasonError::RemoteFetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        let bytes = response.bytes().await.map_err(|err| {
            MasonError::RemoteFetchFailed { url: url.to_string(), reason: err.to_string() }
        })?;
        Ok(bytes.to_vec())
    }

    /// Published SHA-256 for an artifact URL, if the repository has one.
    async fn fetch_checksum(&self, artifact_url: &str) -> Option<String> {
        let url = format!("{artifact_url}.sha256");
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let text = response.text().await.ok()?;
        // Tolerate `<hex>  <filename>` output from checksum tools.
        text.split_whitespace().next().map(str::to_ascii_lowercase)
    }
}

fn to_url_path(path: &std::path::Path) -> String {
    path.iter()
        .map(|segment| segment.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
