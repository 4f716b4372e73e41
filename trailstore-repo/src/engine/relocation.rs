//! Moving, renaming, deleting and annotating managed files.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use trailstore_core::{
    ContentKind, PlacementDecision, PlacementRequest, Sidecar, SidecarUpdate, extension_of,
    sidecar_path,
};
use trailstore_formats::Source;
use trailstore_fs::{Relocation, relocate, write_atomic};

use super::{CrossKindMoves, ManagedFile, Repository};
use crate::journal::Journal;
use crate::{RepositoryError, path};

/// Destination of [`Repository::move_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveTarget {
    /// Destination category; the file's current category when absent.
    pub category: Option<String>,
    /// Folder below the category. When present the file keeps its name and
    /// lands exactly there; otherwise the category's policy decides.
    pub folder: Option<String>,
}

impl MoveTarget {
    /// Move into category `id`, placed by its policy.
    #[must_use]
    pub fn category(id: impl Into<String>) -> Self {
        Self {
            category: Some(id.into()),
            folder: None,
        }
    }

    /// Place the file in `folder` below the destination category.
    #[must_use]
    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }
}

impl Repository {
    /// Move a managed file to another category or folder.
    ///
    /// Without a folder, the destination category's policy places the file
    /// by its date (from content, sidecar or current directory, in that
    /// order for tracks) and taken names receive a collision suffix. With a
    /// folder, the destination must be free. The sidecar travels with the
    /// file. Returns the new relative path.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] for unmanaged sources,
    /// [`RepositoryError::Validation`] for unknown categories, cross-kind
    /// moves (unless enabled) and occupied folder targets,
    /// [`RepositoryError::Conflict`] when either path is locked and
    /// [`RepositoryError::Io`] after a rolled-back filesystem failure.
    pub fn move_file(&self, path: &str, target: &MoveTarget) -> Result<Utf8PathBuf, RepositoryError> {
        let registry = self.registry();
        let file = self.resolve(&registry, path)?;
        let destination = registry.category(target.category.as_deref().unwrap_or(&file.category))?;
        if file.kind != destination.kind() && self.options.cross_kind_moves == CrossKindMoves::Reject {
            return Err(RepositoryError::validation(format!(
                "cannot move {} content {} into {} category `{}`",
                file.kind,
                file.path,
                destination.kind(),
                destination.id()
            )));
        }

        let _source = self.locks.try_lock(&[&file.path])?;
        let decision = match &target.folder {
            Some(folder) => {
                PlacementDecision::new(destination.id(), path::folder(folder)?, file.file_name())?
            }
            None => registry.resolve_policy(destination).decide(&PlacementRequest {
                category: destination.id(),
                kind: destination.kind(),
                file_name: file.file_name(),
                date: Some(self.placement_date(&file)?),
                received_at: Utc::now(),
            })?,
        };
        if decision.relative_path() == file.path {
            debug!("{} is already in place", file.path);
            return Ok(file.path);
        }
        let (to, _guard) = if target.folder.is_some() {
            self.claim_exact(decision.relative_path())?
        } else {
            self.claim(&decision)?
        };
        self.relocate_with_sidecar(&file.path, &to)?;
        info!("moved {} to {to}", file.path);
        Ok(to)
    }

    /// Give a managed file a new name in the same directory.
    ///
    /// When `new_name` does not end in the file's extension, the extension
    /// is appended, so `ride.gpx` renamed to `morning` becomes `morning.gpx`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Validation`] for empty names, names with
    /// path separators and names already taken, plus the errors of
    /// [`Repository::move_file`].
    pub fn rename(&self, path: &str, new_name: &str) -> Result<Utf8PathBuf, RepositoryError> {
        let registry = self.registry();
        let file = self.resolve(&registry, path)?;
        let requested = path::file_name(new_name)?;
        let name = if extension_of(requested).as_deref() == Some(file.extension().as_str()) {
            requested.to_owned()
        } else {
            let original = Utf8Path::new(file.file_name()).extension().unwrap_or_default();
            format!("{requested}.{original}")
        };
        let to = file.path.with_file_name(&name);
        if to == file.path {
            return Ok(to);
        }
        let _source = self.locks.try_lock(&[&file.path])?;
        let (to, _guard) = self.claim_exact(to)?;
        self.relocate_with_sidecar(&file.path, &to)?;
        info!("renamed {} to {to}", file.path);
        Ok(to)
    }

    /// Remove a managed file and its sidecar.
    ///
    /// Failing to remove the sidecar once the file is gone is logged and
    /// otherwise ignored.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] when the file is not managed,
    /// [`RepositoryError::Conflict`] when it is locked and
    /// [`RepositoryError::Io`] when removal fails.
    pub fn delete(&self, path: &str) -> Result<(), RepositoryError> {
        let file = self.resolve(&self.registry(), path)?;
        let _guard = self.locks.try_lock(&[&file.path])?;
        self.fs.remove_file(&file.path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                RepositoryError::not_found(&file.path)
            } else {
                RepositoryError::io("remove", &file.path)(err)
            }
        })?;
        if let Err(err) = self.sidecars.delete(&file.path) {
            warn!("left sidecar of deleted {} behind: {err}", file.path);
        }
        info!("deleted {}", file.path);
        Ok(())
    }

    /// Record a manual position for a media file.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Validation`] for track files and
    /// coordinates outside ±90° latitude or ±180° longitude, plus the
    /// errors of [`Repository::update_sidecar`].
    pub fn update_location(
        &self,
        path: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Sidecar, RepositoryError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(RepositoryError::validation(format!(
                "coordinates ({latitude}, {longitude}) are out of range"
            )));
        }
        let file = self.resolve(&self.registry(), path)?;
        if file.kind == ContentKind::Track {
            return Err(RepositoryError::validation(format!(
                "{} is a track; only media files take a manual location",
                file.path
            )));
        }
        self.write_sidecar(&file, &SidecarUpdate::new().location(latitude, longitude))
    }

    /// Merge `update` into the sidecar of the managed file at `path`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] for unmanaged paths,
    /// [`RepositoryError::Conflict`] when the file is locked,
    /// [`RepositoryError::CorruptInput`] when the existing sidecar does not
    /// decode and [`RepositoryError::Io`] when it cannot be written.
    pub fn update_sidecar(&self, path: &str, update: &SidecarUpdate) -> Result<Sidecar, RepositoryError> {
        let file = self.resolve(&self.registry(), path)?;
        self.write_sidecar(&file, update)
    }

    fn write_sidecar(&self, file: &ManagedFile, update: &SidecarUpdate) -> Result<Sidecar, RepositoryError> {
        let _guard = self.locks.try_lock(&[&file.path])?;
        let sidecar = self.sidecars.write(&file.path, update)?;
        info!("updated sidecar of {}", file.path);
        Ok(sidecar)
    }

    /// Date that places `file` under a date-based policy.
    fn placement_date(&self, file: &ManagedFile) -> Result<DateTime<Utc>, RepositoryError> {
        let content = match self.dispatcher.handler_for(&file.extension()) {
            Some(handler) => {
                let bytes = self.read_managed(&file.path)?;
                match handler.parse(&Source::new(file.file_name(), &bytes)) {
                    Ok(parsed) => handler.primary_date(&parsed),
                    Err(err) => {
                        warn!("ignoring unreadable content of {} when dating it: {err}", file.path);
                        None
                    }
                }
            }
            None => None,
        };
        let annotated = match self.sidecars.read(&file.path) {
            Ok(sidecar) => sidecar.date(),
            Err(err) => {
                warn!("ignoring sidecar of {} when dating it: {err}", file.path);
                None
            }
        };
        let preferred = match file.kind {
            ContentKind::Media => annotated.or(content),
            ContentKind::Track => content.or(annotated),
        };
        Ok(preferred
            .or_else(|| path::date_from_layout(&file.path))
            .unwrap_or_else(|| {
                warn!("{} carries no date, placing it by the current time", file.path);
                Utc::now()
            }))
    }

    /// Move `from` and its sidecar to the free path `to`.
    ///
    /// The new sidecar is written first, then the file is relocated, then
    /// the old sidecar is removed. Any failure undoes the completed steps.
    fn relocate_with_sidecar(&self, from: &Utf8Path, to: &Utf8Path) -> Result<(), RepositoryError> {
        let fs = self.fs.as_ref();
        let dir = to.parent().unwrap_or_else(|| Utf8Path::new(""));
        Journal::run(fs, |journal| {
            let sidecar = self.sidecars.read_raw(from)?;
            let old_sidecar = sidecar_path(from);
            let new_sidecar = sidecar_path(to);
            if let Some(bytes) = &sidecar {
                journal
                    .within_dir(dir, || write_atomic(fs, &new_sidecar, bytes))
                    .map_err(RepositoryError::io("write sidecar", &new_sidecar))?;
                journal.created_file(&new_sidecar);
            }
            match journal
                .within_dir(dir, || relocate(fs, from, to))
                .map_err(RepositoryError::io("move", from))?
            {
                Relocation::Renamed => {}
                Relocation::Copied => warn!("{from} was copied across filesystems to {to}"),
            }
            journal.moved(from, to);
            if let Some(bytes) = sidecar {
                fs.remove_file(&old_sidecar)
                    .map_err(RepositoryError::io("remove sidecar", &old_sidecar))?;
                journal.removed_file(&old_sidecar, bytes);
            }
            Ok(())
        })
    }
}
