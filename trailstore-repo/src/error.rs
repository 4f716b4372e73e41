//! Errors reported by the repository engine.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use trailstore_core::{CategoryConfigError, LookupError, PlacementError};
use trailstore_formats::FormatError;

/// Broad classification of a [`RepositoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid repository configuration; fatal at open.
    Config,
    /// The request itself is unacceptable.
    Validation,
    /// The addressed file is not managed by the repository.
    NotFound,
    /// Stored content or metadata does not parse.
    CorruptInput,
    /// A filesystem operation failed; any partial work was undone.
    Io,
    /// Another mutation currently holds the path.
    Conflict,
}

/// Error raised by [`Repository`](crate::Repository) operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// `storage.toml` or a policy file is invalid.
    #[error("invalid repository configuration: {source}")]
    Config {
        /// Registry validation error.
        #[source]
        source: CategoryConfigError,
    },
    /// The request was rejected before anything was written.
    #[error("{reason}")]
    Validation {
        /// Human-readable explanation.
        reason: String,
    },
    /// Nothing managed exists at the path.
    #[error("no managed file at {path}")]
    NotFound {
        /// Path relative to the repository root.
        path: Utf8PathBuf,
    },
    /// The file content does not conform to its format.
    #[error("failed to parse {path}: {source}")]
    CorruptInput {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Handler error.
        #[source]
        source: FormatError,
    },
    /// The sidecar beside a managed file is not a JSON object.
    #[error("failed to decode sidecar {path}: {source}")]
    CorruptSidecar {
        /// Sidecar location.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A filesystem operation failed.
    #[error("failed to {operation} {path}: {source}")]
    Io {
        /// Short description of the attempted operation.
        operation: &'static str,
        /// Path being operated on.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A concurrent mutation holds the path.
    #[error("{path} is being modified by another operation")]
    Conflict {
        /// Contended path.
        path: Utf8PathBuf,
    },
}

impl RepositoryError {
    /// Classification used by callers to map errors onto responses.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::CorruptInput { .. } | Self::CorruptSidecar { .. } => ErrorKind::CorruptInput,
            Self::Io { .. } => ErrorKind::Io,
            Self::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: &Utf8Path) -> Self {
        Self::NotFound {
            path: path.to_path_buf(),
        }
    }

    /// Closure wrapping an [`io::Error`] for `path`.
    pub(crate) fn io(operation: &'static str, path: &Utf8Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }
}

impl From<CategoryConfigError> for RepositoryError {
    fn from(source: CategoryConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<LookupError> for RepositoryError {
    fn from(err: LookupError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<PlacementError> for RepositoryError {
    fn from(err: PlacementError) -> Self {
        Self::validation(err.to_string())
    }
}
