//! Error handling for Mason
//!
//! This module provides the strongly-typed error enum used across the build
//! core, plus a small helper for rendering errors to CLI users. The design
//! follows two principles:
//!
//! 1. **Typed errors** ([`MasonError`]) for the failure cases the core needs to
//!    distinguish programmatically: resolution errors, transform errors,
//!    repository errors, plan errors and execution errors.
//! 2. **`anyhow` at the seams**: orchestration code (CLI, executor loop) wraps
//!    typed errors with `.context()` so the user sees what the build was doing
//!    when things went wrong.
//!
//! # Error Categories
//!
//! - **Resolution**: [`MasonError::MetadataUnavailable`],
//!   [`MasonError::VersionRangeUnsatisfiable`], [`MasonError::ArtifactNotFound`];
//!   fatal for the requesting subtree unless the node is optional.
//! - **Conflict/Transform**: [`MasonError::UnknownDerivedType`]; a broken type
//!   registry, always fatal, names the missing type id.
//! - **Repository**: [`MasonError::ChecksumMismatch`],
//!   [`MasonError::RemoteFetchFailed`].
//! - **Plan**: [`MasonError::UnknownPhase`], [`MasonError::MissingPredecessor`],
//!   [`MasonError::ReactorCycle`]; invariant violations detected before
//!   execution starts.
//! - **Execution**: [`MasonError::MojoFailed`]; captured per step and
//!   aggregated into the reactor summary; never crashes the scheduler.

use colored::Colorize;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Mason operations.
///
/// Each variant carries enough context to produce an actionable message:
/// offending coordinates, type ids, phase names, and underlying causes.
#[derive(Error, Debug)]
pub enum MasonError {
    /// Dependency metadata could not be read for a required artifact.
    #[error("failed to read dependency metadata for '{coordinate}': {reason}")]
    MetadataUnavailable {
        /// Coordinate whose metadata was requested
        coordinate: String,
        /// Underlying cause
        reason: String,
    },

    /// An artifact was not found in any consulted repository.
    #[error("artifact '{coordinate}' not found in {searched}")]
    ArtifactNotFound {
        /// Coordinate of the missing artifact
        coordinate: String,
        /// Description of the repositories searched
        searched: String,
    },

    /// A version range matched none of the versions a repository offers.
    #[error("no version of '{coordinate}' satisfies range {range} (available: {available})")]
    VersionRangeUnsatisfiable {
        /// group:artifact whose versions were examined
        coordinate: String,
        /// The requested range expression
        range: String,
        /// Comma-separated versions that were considered
        available: String,
    },

    /// A version range expression could not be parsed.
    #[error("invalid version range '{range}': {reason}")]
    InvalidVersionRange {
        /// The offending range expression
        range: String,
        /// What was wrong with it
        reason: String,
    },

    /// Type derivation required a derived type that the registry does not know.
    ///
    /// This indicates a broken type registry and is always fatal.
    #[error(
        "type '{parent_type}' requires children of type '{child_type}' to be remapped, \
         but no derived type is registered for '{child_type}'"
    )]
    UnknownDerivedType {
        /// Type of the ancestor that demands derivation
        parent_type: String,
        /// Child type id with no registered derivation
        child_type: String,
    },

    /// The reactor project graph contains a dependency cycle.
    #[error("circular project dependency detected: {cycle}")]
    ReactorCycle {
        /// Human-readable cycle path, e.g. `a -> b -> a`
        cycle: String,
    },

    /// A build was requested for a phase the lifecycle does not define.
    #[error("unknown lifecycle phase '{phase}'. Available phases are: {available}")]
    UnknownPhase {
        /// The requested phase
        phase: String,
        /// Comma-separated valid phase names
        available: String,
    },

    /// A build step references a predecessor that is not part of the plan.
    #[error("build step '{step}' references predecessor '{predecessor}' which is not in the plan")]
    MissingPredecessor {
        /// The step carrying the dangling edge
        step: String,
        /// The missing predecessor reference
        predecessor: String,
    },

    /// A second wave was opened on a phasing executor that already has one.
    #[error("a task wave is already open on this executor")]
    WaveAlreadyOpen,

    /// A mojo execution failed; recorded as the owning step's failure cause.
    #[error("mojo '{mojo}' failed in {project} [{phase}]: {reason}")]
    MojoFailed {
        /// Project the mojo ran in
        project: String,
        /// Lifecycle phase the mojo was bound to
        phase: String,
        /// Mojo execution id
        mojo: String,
        /// Failure cause
        reason: String,
    },

    /// A downloaded or installed file did not match its expected checksum.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File that failed verification
        path: String,
        /// Expected SHA-256 digest
        expected: String,
        /// Actual SHA-256 digest
        actual: String,
    },

    /// A remote repository request failed after retries.
    #[error("failed to fetch {url}: {reason}")]
    RemoteFetchFailed {
        /// URL that was requested
        url: String,
        /// HTTP status or transport error description
        reason: String,
    },

    /// The manifest file was not found.
    #[error("manifest not found at {}", path.display())]
    ManifestNotFound {
        /// Path that was searched
        path: PathBuf,
    },

    /// The manifest declares a module id that is not `group:artifact:version`.
    #[error("invalid module id '{id}': expected group:artifact:version")]
    InvalidModuleId {
        /// The malformed id
        id: String,
    },

    /// TOML parsing error from manifest loading.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Render an error chain for CLI users: the top-level message in red, the
/// cause chain indented underneath.
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {}", "error:".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".yellow(), cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_derived_type_names_the_missing_id() {
        let err = MasonError::UnknownDerivedType {
            parent_type: "processor".to_string(),
            child_type: "war".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("processor"));
        assert!(msg.contains("'war'"));
    }

    #[test]
    fn range_error_lists_available_versions() {
        let err = MasonError::VersionRangeUnsatisfiable {
            coordinate: "org.example:lib".to_string(),
            range: "[2.0,3.0)".to_string(),
            available: "1.0, 1.1".to_string(),
        };
        assert!(err.to_string().contains("[2.0,3.0)"));
        assert!(err.to_string().contains("1.0, 1.1"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MasonError = io.into();
        assert!(matches!(err, MasonError::IoError(_)));
    }
}
