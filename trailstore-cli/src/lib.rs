//! Command-line interface for managing a trailstore repository.
//!
//! Every subcommand prints its result to standard output as pretty JSON.
//! Options layer from CLI flags, `TRAILSTORE_CMDS_<COMMAND>_<FIELD>`
//! environment variables and the `[cmds.<command>]` tables of a
//! configuration file, with `--repo` defaulting to the current directory.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use serde::Serialize;
use trailstore_repo::{Repository, RepositoryOptions};

mod error;
mod ingest;
mod inspect;
mod manage;

pub use error::CliError;

use ingest::IngestArgs;
use inspect::{CategoriesArgs, GeojsonArgs, ListArgs};
use manage::{DeleteArgs, LocateArgs, MoveArgs, RenameArgs};

const ARG_REPO: &str = "repo";
const ARG_FILE: &str = "file";
const ARG_PATH: &str = "path";
const ARG_NEW_NAME: &str = "new-name";
const ARG_CATEGORY: &str = "category";
const ARG_FOLDER: &str = "folder";
const ARG_LATITUDE: &str = "latitude";
const ARG_LONGITUDE: &str = "longitude";
const ARG_DATE: &str = "date";
const ARG_ALLOW_CROSS_KIND: &str = "allow-cross-kind";

const ENV_INGEST_FILE: &str = "TRAILSTORE_CMDS_INGEST_FILE";
const ENV_MOVE_PATH: &str = "TRAILSTORE_CMDS_MOVE_PATH";
const ENV_RENAME_PATH: &str = "TRAILSTORE_CMDS_RENAME_PATH";
const ENV_RENAME_NEW_NAME: &str = "TRAILSTORE_CMDS_RENAME_NEW_NAME";
const ENV_DELETE_PATH: &str = "TRAILSTORE_CMDS_DELETE_PATH";
const ENV_GEOJSON_PATH: &str = "TRAILSTORE_CMDS_GEOJSON_PATH";
const ENV_LOCATE_PATH: &str = "TRAILSTORE_CMDS_LOCATE_PATH";
const ENV_LOCATE_LATITUDE: &str = "TRAILSTORE_CMDS_LOCATE_LATITUDE";
const ENV_LOCATE_LONGITUDE: &str = "TRAILSTORE_CMDS_LOCATE_LONGITUDE";

/// Run the trailstore CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    dispatch(cli.command, &mut handle)
}

fn dispatch(command: Command, out: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Ingest(args) => ingest::run_ingest_with(args.into_config()?, out),
        Command::Move(args) => manage::run_move_with(args.into_config()?, out),
        Command::Rename(args) => manage::run_rename_with(args.into_config()?, out),
        Command::Delete(args) => manage::run_delete_with(args.into_config()?, out),
        Command::Locate(args) => manage::run_locate_with(args.into_config()?, out),
        Command::List(args) => inspect::run_list_with(&args.into_root()?, out),
        Command::Geojson(args) => inspect::run_geojson_with(args.into_config()?, out),
        Command::Categories(args) => inspect::run_categories_with(&args.into_root()?, out),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "trailstore",
    about = "Organise GPS tracks and geotagged media into a category repository",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a file in the repository.
    Ingest(IngestArgs),
    /// Move a managed file to another category or folder.
    Move(MoveArgs),
    /// Rename a managed file in place.
    Rename(RenameArgs),
    /// Delete a managed file and its sidecar.
    Delete(DeleteArgs),
    /// Record a manual location for a media file.
    Locate(LocateArgs),
    /// List every managed file.
    List(ListArgs),
    /// Print a managed file as a GeoJSON feature collection.
    Geojson(GeojsonArgs),
    /// Print the configured categories.
    Categories(CategoriesArgs),
}

fn repo_root(repo: Option<Utf8PathBuf>) -> Utf8PathBuf {
    repo.unwrap_or_else(|| Utf8PathBuf::from("."))
}

fn open_repository(root: &Utf8Path, options: RepositoryOptions) -> Result<Repository, CliError> {
    Ok(Repository::open_with_options(root, options)?)
}

fn write_json<T: Serialize + ?Sized>(value: &T, out: &mut dyn Write) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    out.write_all(json.as_bytes())
        .and_then(|()| out.write_all(b"\n"))
        .map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
