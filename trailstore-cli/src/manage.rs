//! Commands that change managed files: `move`, `rename`, `delete` and
//! `locate`.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use trailstore_repo::{CrossKindMoves, MoveTarget, RepositoryOptions};

use crate::{
    ARG_ALLOW_CROSS_KIND, ARG_CATEGORY, ARG_FOLDER, ARG_LATITUDE, ARG_LONGITUDE, ARG_NEW_NAME,
    ARG_PATH, ARG_REPO, CliError, ENV_DELETE_PATH, ENV_LOCATE_LATITUDE, ENV_LOCATE_LONGITUDE,
    ENV_LOCATE_PATH, ENV_MOVE_PATH, ENV_RENAME_NEW_NAME, ENV_RENAME_PATH, open_repository,
    repo_root, write_json,
};

/// Old and new location of a relocated file.
#[derive(Debug, Serialize)]
struct Relocated<'a> {
    from: &'a str,
    to: &'a Utf8Path,
}

/// CLI arguments for the `move` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "move",
    long_about = "Move a managed file, together with its sidecar, into \
                 another category or an explicit folder. Without a folder \
                 the destination category's storage policy chooses the \
                 path.",
    about = "Move a managed file"
)]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct MoveArgs {
    /// Repository-relative path of the file to move.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<String>,
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
    /// Destination category; the current one when omitted.
    #[arg(long = ARG_CATEGORY, value_name = "id")]
    #[serde(default)]
    pub(crate) category: Option<String>,
    /// Folder below the destination category.
    #[arg(long = ARG_FOLDER, value_name = "folder")]
    #[serde(default)]
    pub(crate) folder: Option<String>,
    /// Permit moving tracks into media categories and back.
    #[arg(long = ARG_ALLOW_CROSS_KIND, value_name = "bool")]
    #[serde(default)]
    pub(crate) allow_cross_kind: Option<bool>,
}

impl MoveArgs {
    pub(crate) fn into_config(self) -> Result<MoveConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        MoveConfig::try_from(merged)
    }
}

/// Resolved `move` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MoveConfig {
    pub(crate) repo: Utf8PathBuf,
    pub(crate) path: String,
    pub(crate) target: MoveTarget,
    pub(crate) options: RepositoryOptions,
}

impl TryFrom<MoveArgs> for MoveConfig {
    type Error = CliError;

    fn try_from(args: MoveArgs) -> Result<Self, Self::Error> {
        let path = args.path.ok_or(CliError::MissingArgument {
            field: ARG_PATH,
            env: ENV_MOVE_PATH,
        })?;
        let cross_kind_moves = if args.allow_cross_kind.unwrap_or(false) {
            CrossKindMoves::Allow
        } else {
            CrossKindMoves::Reject
        };
        Ok(Self {
            repo: repo_root(args.repo),
            path,
            target: MoveTarget {
                category: args.category,
                folder: args.folder,
            },
            options: RepositoryOptions { cross_kind_moves },
        })
    }
}

pub(crate) fn run_move_with(config: MoveConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(&config.repo, config.options)?;
    let to = repo.move_file(&config.path, &config.target)?;
    write_json(
        &Relocated {
            from: &config.path,
            to: &to,
        },
        out,
    )
}

/// CLI arguments for the `rename` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "rename",
    about = "Rename a managed file in its current directory"
)]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct RenameArgs {
    /// Repository-relative path of the file to rename.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<String>,
    /// New file name; the original extension is kept.
    #[arg(value_name = "name")]
    #[serde(default)]
    pub(crate) new_name: Option<String>,
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
}

impl RenameArgs {
    pub(crate) fn into_config(self) -> Result<RenameConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RenameConfig::try_from(merged)
    }
}

/// Resolved `rename` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RenameConfig {
    pub(crate) repo: Utf8PathBuf,
    pub(crate) path: String,
    pub(crate) new_name: String,
}

impl TryFrom<RenameArgs> for RenameConfig {
    type Error = CliError;

    fn try_from(args: RenameArgs) -> Result<Self, Self::Error> {
        let path = args.path.ok_or(CliError::MissingArgument {
            field: ARG_PATH,
            env: ENV_RENAME_PATH,
        })?;
        let new_name = args.new_name.ok_or(CliError::MissingArgument {
            field: ARG_NEW_NAME,
            env: ENV_RENAME_NEW_NAME,
        })?;
        Ok(Self {
            repo: repo_root(args.repo),
            path,
            new_name,
        })
    }
}

pub(crate) fn run_rename_with(config: RenameConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(&config.repo, RepositoryOptions::default())?;
    let to = repo.rename(&config.path, &config.new_name)?;
    write_json(
        &Relocated {
            from: &config.path,
            to: &to,
        },
        out,
    )
}

/// CLI arguments for the `delete` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "delete", about = "Delete a managed file and its sidecar")]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct DeleteArgs {
    /// Repository-relative path of the file to delete.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<String>,
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
}

impl DeleteArgs {
    pub(crate) fn into_config(self) -> Result<DeleteConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        DeleteConfig::try_from(merged)
    }
}

/// Resolved `delete` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeleteConfig {
    pub(crate) repo: Utf8PathBuf,
    pub(crate) path: String,
}

impl TryFrom<DeleteArgs> for DeleteConfig {
    type Error = CliError;

    fn try_from(args: DeleteArgs) -> Result<Self, Self::Error> {
        let path = args.path.ok_or(CliError::MissingArgument {
            field: ARG_PATH,
            env: ENV_DELETE_PATH,
        })?;
        Ok(Self {
            repo: repo_root(args.repo),
            path,
        })
    }
}

#[derive(Debug, Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
}

pub(crate) fn run_delete_with(config: DeleteConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(&config.repo, RepositoryOptions::default())?;
    repo.delete(&config.path)?;
    write_json(
        &Deleted {
            deleted: &config.path,
        },
        out,
    )
}

/// CLI arguments for the `locate` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "locate",
    long_about = "Record a manual position in the sidecar of a media file. \
                 The position replaces any location embedded in the file \
                 when it is rendered as GeoJSON.",
    about = "Record a manual location for a media file"
)]
#[ortho_config(prefix = "TRAILSTORE")]
pub(crate) struct LocateArgs {
    /// Repository-relative path of the media file.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<String>,
    /// Repository root; defaults to the current directory.
    #[arg(long = ARG_REPO, value_name = "dir")]
    #[serde(default)]
    pub(crate) repo: Option<Utf8PathBuf>,
    /// Latitude in decimal degrees.
    #[arg(long = ARG_LATITUDE, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) latitude: Option<f64>,
    /// Longitude in decimal degrees.
    #[arg(long = ARG_LONGITUDE, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) longitude: Option<f64>,
}

impl LocateArgs {
    pub(crate) fn into_config(self) -> Result<LocateConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LocateConfig::try_from(merged)
    }
}

/// Resolved `locate` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocateConfig {
    pub(crate) repo: Utf8PathBuf,
    pub(crate) path: String,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
}

impl TryFrom<LocateArgs> for LocateConfig {
    type Error = CliError;

    fn try_from(args: LocateArgs) -> Result<Self, Self::Error> {
        let path = args.path.ok_or(CliError::MissingArgument {
            field: ARG_PATH,
            env: ENV_LOCATE_PATH,
        })?;
        let latitude = args.latitude.ok_or(CliError::MissingArgument {
            field: ARG_LATITUDE,
            env: ENV_LOCATE_LATITUDE,
        })?;
        let longitude = args.longitude.ok_or(CliError::MissingArgument {
            field: ARG_LONGITUDE,
            env: ENV_LOCATE_LONGITUDE,
        })?;
        Ok(Self {
            repo: repo_root(args.repo),
            path,
            latitude,
            longitude,
        })
    }
}

pub(crate) fn run_locate_with(config: LocateConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let repo = open_repository(&config.repo, RepositoryOptions::default())?;
    let sidecar = repo.update_location(&config.path, config.latitude, config.longitude)?;
    write_json(&sidecar, out)
}
