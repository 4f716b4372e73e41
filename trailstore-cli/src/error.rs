//! Error types emitted by the trailstore CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use trailstore_repo::RepositoryError;

/// Errors emitted by the trailstore CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Only one half of a coordinate pair was given.
    #[error("--latitude and --longitude must be given together")]
    IncompleteLocation,
    /// A capture date did not parse as RFC 3339.
    #[error("capture date {value:?} is not an RFC 3339 timestamp: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The input path has no usable file name.
    #[error("input path {path:?} has no file name")]
    UnnamedInput { path: Utf8PathBuf },
    /// Reading the file to ingest failed.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The repository refused or failed the operation.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Serializing the command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
