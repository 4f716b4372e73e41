//! `ingest` command: store a file from disk in the repository.

use std::io::Write;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use trailstore_core::SidecarUpdate;
use trailstore_fs::read_ambient_file;
use trailstore_repo::{IngestRequest, RepositoryOptions};

use crate::{
    ARG_CATEGORY, ARG_DATE, ARG_FILE, ARG_LATITUDE, ARG_LONGITUDE, ARG_REPO, CliError,
    ENV_INGEST_FILE, open_repository, repo_root, write_json,
};

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "ingest",
    long_about = "Store a GPS track or media file in the repository. The \
                 category is chosen from the file extension unless one is \
                 given, and the file is placed by the category's storage \
                 policy using the date found in its content.",
    about = "Store a file in the repository"
)]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct IngestArgs {
    /// File to store.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) file: Option<Utf8PathBuf>,
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
    /// Category to store into instead of the one owning the extension.
    #[arg(long = ARG_CATEGORY, value_name = "id")]
    #[serde(default)]
    pub(crate) category: Option<String>,
    /// Manual latitude recorded in the sidecar.
    #[arg(long = ARG_LATITUDE, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) latitude: Option<f64>,
    /// Manual longitude recorded in the sidecar.
    #[arg(long = ARG_LONGITUDE, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) longitude: Option<f64>,
    /// Manual capture date (RFC 3339) recorded in the sidecar.
    #[arg(long = ARG_DATE, value_name = "timestamp")]
    #[serde(default)]
    pub(crate) date: Option<String>,
}

impl IngestArgs {
    pub(crate) fn into_config(self) -> Result<IngestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestConfig::try_from(merged)
    }
}

/// Resolved `ingest` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IngestConfig {
    pub(crate) repo: Utf8PathBuf,
    pub(crate) file: Utf8PathBuf,
    pub(crate) category: Option<String>,
    pub(crate) location: Option<(f64, f64)>,
    pub(crate) date: Option<DateTime<Utc>>,
}

impl IngestConfig {
    /// Sidecar metadata requested on the command line.
    pub(crate) fn overrides(&self) -> SidecarUpdate {
        let mut update = SidecarUpdate::new();
        if let Some((latitude, longitude)) = self.location {
            update = update.location(latitude, longitude);
        }
        if let Some(date) = self.date {
            update = update.capture_date(date);
        }
        update
    }
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let file = args.file.ok_or(CliError::MissingArgument {
            field: ARG_FILE,
            env: ENV_INGEST_FILE,
        })?;
        let location = match (args.latitude, args.longitude) {
            (Some(latitude), Some(longitude)) => Some((latitude, longitude)),
            (None, None) => None,
            _ => return Err(CliError::IncompleteLocation),
        };
        let date = args.date.map(parse_date).transpose()?;
        Ok(Self {
            repo: repo_root(args.repo),
            file,
            category: args.category,
            location,
            date,
        })
    }
}

fn parse_date(value: String) -> Result<DateTime<Utc>, CliError> {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(date) => Ok(date.with_timezone(&Utc)),
        Err(source) => Err(CliError::InvalidDate { value, source }),
    }
}

pub(crate) fn run_ingest_with(config: IngestConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let name = config.file.file_name().ok_or_else(|| CliError::UnnamedInput {
        path: config.file.clone(),
    })?;
    let content = read_ambient_file(&config.file).map_err(|source| CliError::ReadInput {
        path: config.file.clone(),
        source,
    })?;
    let repo = open_repository(&config.repo, RepositoryOptions::default())?;
    let mut request = IngestRequest::new(name, &content).with_overrides(config.overrides());
    if let Some(category) = config.category.as_deref() {
        request = request.in_category(category);
    }
    let outcome = repo.ingest(&request)?;
    write_json(&outcome, out)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<IngestConfig, CliError> {
    let merged = IngestArgs::merge_from_layers(layers).map_err(CliError::from)?;
    IngestConfig::try_from(merged)
}
