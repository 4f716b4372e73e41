//! Read-only commands: `list`, `geojson` and `categories`.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use trailstore_repo::RepositoryOptions;

use crate::{ARG_PATH, ARG_REPO, CliError, ENV_GEOJSON_PATH, open_repository, repo_root, write_json};

/// CLI arguments for the `list` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "list", about = "List every managed file with its category")]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct ListArgs {
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
}

impl ListArgs {
    pub(crate) fn into_root(self) -> Result<Utf8PathBuf, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(repo_root(merged.repo))
    }
}

pub(crate) fn run_list_with(root: &Utf8Path, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(root, RepositoryOptions::default())?;
    let files = repo
        .list()
        .map(|path| path.and_then(|path| repo.managed_file(path.as_str())))
        .collect::<Result<Vec<_>, _>>()?;
    write_json(&files, out)
}

/// CLI arguments for the `geojson` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "geojson",
    long_about = "Parse a managed track or media file and print it as a \
                 GeoJSON FeatureCollection, with any manual location or \
                 date from its sidecar applied.",
    about = "Print a managed file as GeoJSON"
)]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct GeojsonArgs {
    /// Repository-relative path of the file.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<String>,
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
}

impl GeojsonArgs {
    pub(crate) fn into_config(self) -> Result<GeojsonConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        GeojsonConfig::try_from(merged)
    }
}

/// Resolved `geojson` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeojsonConfig {
    pub(crate) repo: Utf8PathBuf,
    pub(crate) path: String,
}

impl TryFrom<GeojsonArgs> for GeojsonConfig {
    type Error = CliError;

    fn try_from(args: GeojsonArgs) -> Result<Self, Self::Error> {
        let path = args.path.ok_or(CliError::MissingArgument {
            field: ARG_PATH,
            env: ENV_GEOJSON_PATH,
        })?;
        Ok(Self {
            repo: repo_root(args.repo),
            path,
        })
    }
}

pub(crate) fn run_geojson_with(config: GeojsonConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(&config.repo, RepositoryOptions::default())?;
    write_json(&repo.geojson(&config.path)?, out)
}

/// CLI arguments for the `categories` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "categories", about = "Print the configured categories")]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct CategoriesArgs {
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
}

impl CategoriesArgs {
    pub(crate) fn into_root(self) -> Result<Utf8PathBuf, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(repo_root(merged.repo))
    }
}

pub(crate) fn run_categories_with(root: &Utf8Path, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(root, RepositoryOptions::default())?;
    write_json(&repo.categories(), out)
}
