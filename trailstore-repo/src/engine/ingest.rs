//! Adding new content to the repository.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use trailstore_core::{
    ContentKind, PlacementRequest, Sidecar, SidecarUpdate, extension_of, sidecar_path,
};
use trailstore_formats::Source;
use trailstore_fs::temp_sibling;

use super::Repository;
use crate::journal::{Journal, prune_empty};
use crate::{RepositoryError, path};

/// Content offered to [`Repository::ingest`].
#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
    /// Original file name; its extension selects the category and handler.
    pub file_name: &'a str,
    /// Complete file content.
    pub content: &'a [u8],
    /// Explicit category; resolved from the extension when absent.
    pub category: Option<&'a str>,
    /// Metadata written to the new file's sidecar.
    pub overrides: SidecarUpdate,
    /// Moment the content arrived, used when no other date is known.
    pub received_at: DateTime<Utc>,
}

impl<'a> IngestRequest<'a> {
    /// Request for `content` named `file_name`, received now.
    #[must_use]
    pub fn new(file_name: &'a str, content: &'a [u8]) -> Self {
        Self {
            file_name,
            content,
            category: None,
            overrides: SidecarUpdate::new(),
            received_at: Utc::now(),
        }
    }

    /// Store into category `id` instead of resolving by extension.
    #[must_use]
    pub const fn in_category(mut self, id: &'a str) -> Self {
        self.category = Some(id);
        self
    }

    /// Sidecar metadata to record with the file.
    #[must_use]
    pub fn with_overrides(mut self, overrides: SidecarUpdate) -> Self {
        self.overrides = overrides;
        self
    }

    /// Override the arrival timestamp.
    #[must_use]
    pub const fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }
}

/// Where ingested content ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Path relative to the repository root.
    pub path: Utf8PathBuf,
    /// Category the file was stored in.
    pub category: String,
    /// Date used for placement.
    pub date: DateTime<Utc>,
}

impl Repository {
    /// Store new content.
    ///
    /// The content is staged as a hidden file in the provisional
    /// destination directory and parsed for its primary date. The final
    /// destination is then computed from that date, collision suffixes are
    /// applied, and the staged file is renamed into place before overrides
    /// are written to its sidecar. A failure at any step removes every file
    /// and directory the call created.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Validation`] for unusable names,
    /// categories or extensions, [`RepositoryError::CorruptInput`] when the
    /// content does not parse and [`RepositoryError::Io`] for filesystem
    /// failures.
    pub fn ingest(&self, request: &IngestRequest<'_>) -> Result<IngestOutcome, RepositoryError> {
        let file_name = path::file_name(request.file_name)?;
        let extension = extension_of(file_name).ok_or_else(|| {
            RepositoryError::validation(format!("file name `{file_name}` has no extension"))
        })?;
        let registry = self.registry();
        let category = match request.category {
            Some(id) => {
                let category = registry.category(id)?;
                if !category.accepts(&extension) {
                    return Err(RepositoryError::validation(format!(
                        "category `{id}` does not accept `{extension}` files"
                    )));
                }
                category
            }
            None => registry.resolve_category(&extension)?,
        };
        let handler = self.handler(&extension)?;
        let policy = registry.resolve_policy(category);
        let override_date = request.overrides.date();
        let placement = |date| PlacementRequest {
            category: category.id(),
            kind: category.kind(),
            file_name,
            date,
            received_at: request.received_at,
        };
        let provisional = policy.decide(&placement(override_date))?;

        let fs = self.fs.as_ref();
        Journal::run(fs, |journal| {
            let staging = temp_sibling(&provisional.relative_path());
            journal
                .within_dir(&provisional.parent(), || fs.write_new(&staging, request.content))
                .map_err(RepositoryError::io("stage", &staging))?;
            journal.created_file(&staging);

            let parsed = handler
                .parse(&Source::new(file_name, request.content))
                .map_err(|source| RepositoryError::CorruptInput {
                    path: Utf8PathBuf::from(file_name),
                    source,
                })?;
            let found = handler.primary_date(&parsed);
            let date = match category.kind() {
                ContentKind::Media => override_date.or(found),
                ContentKind::Track => found.or(override_date),
            }
            .unwrap_or_else(|| {
                warn!("{file_name} carries no date, placing it by arrival time");
                request.received_at
            });

            let decision = policy.decide(&placement(Some(date)))?;
            let (target, _guard) = self.claim(&decision)?;
            journal
                .within_dir(&decision.parent(), || fs.rename(&staging, &target))
                .map_err(RepositoryError::io("place", &target))?;
            journal.consumed(&staging);
            journal.created_file(&target);

            if !request.overrides.is_empty() {
                let sidecar = Sidecar::default().merged(&request.overrides);
                journal.created_file(&sidecar_path(&target));
                self.sidecars.replace(&target, &sidecar)?;
            }

            prune_empty(fs, journal.created_directories());
            info!("ingested {target} into {}", category.id());
            Ok(IngestOutcome {
                path: target,
                category: category.id().to_owned(),
                date,
            })
        })
    }
}
