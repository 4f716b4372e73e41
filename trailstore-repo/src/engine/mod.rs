//! The repository engine: every operation that touches managed files.

mod ingest;
mod relocation;

use std::io;
use std::sync::{Arc, PoisonError, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use trailstore_core::{
    CategoryConfigError, CategoryView, ContentKind, GeographicFeature, PlacementDecision, Registry,
    RepositoryConfig, Sidecar, extension_of, resolve_collision, sidecar_path,
};
use trailstore_formats::{FormatDispatcher, FormatHandler, Source};
use trailstore_fs::{CapRoot, EntryKind, RepoFs};

use crate::listing::ManagedFiles;
use crate::lock::{PathGuard, PathLocks};
use crate::path;
use crate::sidecar_store::SidecarStore;
use crate::RepositoryError;

pub use ingest::{IngestOutcome, IngestRequest};
pub use relocation::MoveTarget;

/// Repository configuration file, relative to the root.
pub const CONFIG_FILE: &str = "storage.toml";

/// Whether a file may move into a category of a different content kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrossKindMoves {
    /// Moving a track into a media category, or the reverse, is a
    /// validation error.
    #[default]
    Reject,
    /// Files may move between kinds.
    Allow,
}

/// Behaviour switches for a [`Repository`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Policy for moves between content kinds.
    pub cross_kind_moves: CrossKindMoves,
}

/// A managed file as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedFile {
    /// Path relative to the repository root.
    pub path: Utf8PathBuf,
    /// Category the file lives in.
    pub category: String,
    /// Kind of the file's content.
    pub kind: ContentKind,
}

impl ManagedFile {
    pub(crate) fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or_default()
    }

    pub(crate) fn extension(&self) -> String {
        extension_of(self.file_name()).unwrap_or_default()
    }
}

/// A file repository organised by category.
///
/// The repository owns a capability-scoped root, a validated [`Registry`]
/// and a [`FormatDispatcher`]. Every mutation either completes or leaves the
/// tree as it found it; concurrent mutations of the same path fail fast
/// with [`RepositoryError::Conflict`].
pub struct Repository {
    fs: Arc<dyn RepoFs>,
    registry: RwLock<Arc<Registry>>,
    dispatcher: FormatDispatcher,
    sidecars: SidecarStore,
    locks: PathLocks,
    options: RepositoryOptions,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("dispatcher", &self.dispatcher)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open the repository rooted at `root`, creating the directory when it
    /// does not exist.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Io`] when the root cannot be opened and
    /// [`RepositoryError::Config`] when `storage.toml` is invalid.
    pub fn open(root: &Utf8Path) -> Result<Self, RepositoryError> {
        Self::open_with_options(root, RepositoryOptions::default())
    }

    /// [`Repository::open`] with explicit options.
    ///
    /// # Errors
    /// As for [`Repository::open`].
    pub fn open_with_options(
        root: &Utf8Path,
        options: RepositoryOptions,
    ) -> Result<Self, RepositoryError> {
        let fs = CapRoot::open(root).map_err(RepositoryError::io("open repository", root))?;
        Self::open_with(Arc::new(fs), options)
    }

    /// Open a repository over an existing filesystem handle, reading its
    /// configuration from `storage.toml`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Config`] when the configuration is invalid.
    pub fn open_with(fs: Arc<dyn RepoFs>, options: RepositoryOptions) -> Result<Self, RepositoryError> {
        let registry = load_registry(fs.as_ref())?;
        Ok(Self::with_registry(fs, registry, options))
    }

    /// Assemble a repository from parts, with the built-in format handlers.
    #[must_use]
    pub fn with_registry(fs: Arc<dyn RepoFs>, registry: Registry, options: RepositoryOptions) -> Self {
        Self {
            sidecars: SidecarStore::new(Arc::clone(&fs)),
            fs,
            registry: RwLock::new(Arc::new(registry)),
            dispatcher: FormatDispatcher::with_defaults(),
            locks: PathLocks::default(),
            options,
        }
    }

    /// Replace the format dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: FormatDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Re-read `storage.toml` and swap in the new registry.
    ///
    /// Operations already running keep the registry they started with.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Config`] and keeps the current registry
    /// when the new configuration is invalid.
    pub fn reload_config(&self) -> Result<(), RepositoryError> {
        let registry = Arc::new(load_registry(self.fs.as_ref())?);
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = registry;
        info!("repository configuration reloaded");
        Ok(())
    }

    /// Registry in effect right now.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Public view of every category, in identifier order.
    #[must_use]
    pub fn categories(&self) -> Vec<CategoryView> {
        self.registry().views()
    }

    /// Lazily walk every managed file. Each call starts a fresh walk.
    #[must_use]
    pub fn list(&self) -> ManagedFiles {
        ManagedFiles::new(Arc::clone(&self.fs), self.registry())
    }

    /// Describe the managed file at `path`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] when nothing managed exists
    /// there and [`RepositoryError::Validation`] for malformed paths.
    pub fn managed_file(&self, path: &str) -> Result<ManagedFile, RepositoryError> {
        self.resolve(&self.registry(), path)
    }

    /// Sidecar metadata of the managed file at `path`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] for unmanaged paths and
    /// [`RepositoryError::CorruptInput`] for undecodable sidecars.
    pub fn sidecar(&self, path: &str) -> Result<Sidecar, RepositoryError> {
        let file = self.managed_file(path)?;
        self.sidecars.read(&file.path)
    }

    /// Geographic feature of the file at `path`, with sidecar overrides
    /// applied.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] when the file is not managed,
    /// [`RepositoryError::CorruptInput`] when its content or sidecar does
    /// not parse, and [`RepositoryError::Validation`] when no handler
    /// understands its format.
    pub fn feature(&self, path: &str) -> Result<GeographicFeature, RepositoryError> {
        let file = self.managed_file(path)?;
        let handler = self.handler(&file.extension())?;
        let bytes = self.read_managed(&file.path)?;
        let parsed = handler
            .parse(&Source::new(file.file_name(), &bytes))
            .map_err(|source| RepositoryError::CorruptInput {
                path: file.path.clone(),
                source,
            })?;
        let mut feature = handler.to_feature(file.file_name(), parsed);
        feature.apply_overrides(&self.sidecars.read(&file.path)?);
        feature.category = Some(file.category);
        Ok(feature)
    }

    /// [`Repository::feature`] rendered as a GeoJSON `FeatureCollection`.
    ///
    /// # Errors
    /// As for [`Repository::feature`].
    pub fn geojson(&self, path: &str) -> Result<Value, RepositoryError> {
        self.feature(path).map(|feature| feature.to_geojson())
    }

    fn resolve(&self, registry: &Registry, raw: &str) -> Result<ManagedFile, RepositoryError> {
        let path = path::managed_path(raw)?;
        let name = path.file_name().unwrap_or_default();
        let extension = extension_of(name)
            .filter(|extension| !name.starts_with('.') && registry.is_managed_extension(extension))
            .ok_or_else(|| RepositoryError::not_found(&path))?;
        match self.fs.kind(&path).map_err(RepositoryError::io("inspect", &path))? {
            Some(EntryKind::File) => {}
            _ => return Err(RepositoryError::not_found(&path)),
        }
        let category = match path.components().next().map(|first| registry.category(first.as_str())) {
            Some(Ok(category)) => category,
            _ => registry.resolve_category(&extension)?,
        };
        let kind = self
            .dispatcher
            .handler_for(&extension)
            .map_or(category.kind(), |handler| handler.kind());
        Ok(ManagedFile {
            category: category.id().to_owned(),
            kind,
            path,
        })
    }

    fn handler(&self, extension: &str) -> Result<&dyn FormatHandler, RepositoryError> {
        self.dispatcher.handler_for(extension).ok_or_else(|| {
            RepositoryError::validation(format!("no format handler for `{extension}` files"))
        })
    }

    fn read_managed(&self, path: &Utf8Path) -> Result<Vec<u8>, RepositoryError> {
        self.fs.read(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                RepositoryError::not_found(path)
            } else {
                RepositoryError::io("read", path)(err)
            }
        })
    }

    /// Whether the file or its sidecar exists at `path`.
    fn occupied(&self, path: &Utf8Path) -> Result<bool, RepositoryError> {
        let sidecar = sidecar_path(path);
        let file = self.fs.kind(path).map_err(RepositoryError::io("inspect", path))?;
        let meta = self.fs.kind(&sidecar).map_err(RepositoryError::io("inspect", &sidecar))?;
        Ok(file.is_some() || meta.is_some())
    }

    /// Lock the first free variant of `decision`, applying collision
    /// suffixes as needed.
    fn claim(&self, decision: &PlacementDecision) -> Result<(Utf8PathBuf, PathGuard<'_>), RepositoryError> {
        let mut claimed = None;
        let chosen = resolve_collision(decision, |candidate| {
            let guard = match self.locks.try_lock(&[candidate]) {
                Ok(guard) => guard,
                Err(RepositoryError::Conflict { .. }) => return Ok(true),
                Err(err) => return Err(err),
            };
            if self.occupied(candidate)? {
                return Ok(true);
            }
            claimed = Some(guard);
            Ok(false)
        })?;
        match (chosen, claimed) {
            (Some(chosen), Some(guard)) => {
                let path = chosen.relative_path();
                if chosen != *decision {
                    debug!("{} is taken, using {path}", decision.relative_path());
                }
                Ok((path, guard))
            }
            _ => Err(RepositoryError::validation(format!(
                "no free name for {}",
                decision.relative_path()
            ))),
        }
    }

    /// Lock `path`, which must be free; no suffix is applied.
    fn claim_exact(&self, path: Utf8PathBuf) -> Result<(Utf8PathBuf, PathGuard<'_>), RepositoryError> {
        let guard = self.locks.try_lock(&[&path])?;
        if self.occupied(&path)? {
            return Err(RepositoryError::validation(format!("{path} already exists")));
        }
        Ok((path, guard))
    }
}

fn load_registry(fs: &dyn RepoFs) -> Result<Registry, RepositoryError> {
    let config_path = Utf8Path::new(CONFIG_FILE);
    let config = match read_text(fs, config_path).map_err(RepositoryError::io("read", config_path))? {
        Some(text) => RepositoryConfig::from_toml(&text)
            .map_err(|source| CategoryConfigError::Parse { source })?,
        None => {
            warn!("no {CONFIG_FILE} in repository, using the default layout");
            RepositoryConfig::default_layout()
        }
    };
    let registry = Registry::load(&config, |file| {
        let path = path::managed_path(file)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        read_text(fs, &path)
    })?;
    debug!("loaded {} categories", registry.categories().count());
    Ok(registry)
}

fn read_text(fs: &dyn RepoFs, path: &Utf8Path) -> io::Result<Option<String>> {
    match fs.read(path) {
        Ok(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
