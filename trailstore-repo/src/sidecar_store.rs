//! Persistence of sidecar metadata beside managed files.

use std::io;
use std::sync::Arc;

use camino::Utf8Path;
use log::debug;
use trailstore_core::{Sidecar, SidecarUpdate, sidecar_path};
use trailstore_fs::{RepoFs, discard_file, write_atomic};

use crate::RepositoryError;

/// Reads and writes `<file>.json` sidecars.
///
/// Every write replaces the whole document through a staging file and an
/// atomic rename, so readers never observe a partially written sidecar.
#[derive(Clone)]
pub struct SidecarStore {
    fs: Arc<dyn RepoFs>,
}

impl std::fmt::Debug for SidecarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarStore").finish_non_exhaustive()
    }
}

impl SidecarStore {
    /// Store operating on `fs`.
    #[must_use]
    pub fn new(fs: Arc<dyn RepoFs>) -> Self {
        Self { fs }
    }

    /// Sidecar of the managed file at `path`; empty when none exists.
    ///
    /// # Errors
    /// Returns [`RepositoryError::CorruptSidecar`] for a document that is
    /// not a JSON object and [`RepositoryError::Io`] for read failures.
    pub fn read(&self, path: &Utf8Path) -> Result<Sidecar, RepositoryError> {
        let location = sidecar_path(path);
        match self.read_raw(path)? {
            Some(bytes) => Sidecar::from_json(&bytes)
                .map_err(|source| RepositoryError::CorruptSidecar { path: location, source }),
            None => Ok(Sidecar::default()),
        }
    }

    /// Raw sidecar bytes for the managed file at `path`, if any.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Io`] when the sidecar exists but cannot be
    /// read.
    pub fn read_raw(&self, path: &Utf8Path) -> Result<Option<Vec<u8>>, RepositoryError> {
        let location = sidecar_path(path);
        match self.fs.read(&location) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(RepositoryError::io("read sidecar", &location)(err)),
        }
    }

    /// Merge `update` into the sidecar of `path` and persist the result.
    ///
    /// A merge that leaves no keys removes the sidecar instead.
    ///
    /// # Errors
    /// Returns [`RepositoryError::CorruptSidecar`] when the existing sidecar
    /// cannot be decoded and [`RepositoryError::Io`] when it cannot be
    /// replaced.
    pub fn write(&self, path: &Utf8Path, update: &SidecarUpdate) -> Result<Sidecar, RepositoryError> {
        let merged = self.read(path)?.merged(update);
        self.replace(path, &merged)?;
        Ok(merged)
    }

    /// Persist `sidecar` as the complete sidecar of `path`.
    pub(crate) fn replace(&self, path: &Utf8Path, sidecar: &Sidecar) -> Result<(), RepositoryError> {
        let location = sidecar_path(path);
        if sidecar.is_empty() {
            debug!("sidecar for {path} is empty, removing it");
            return discard_file(self.fs.as_ref(), &location)
                .map_err(RepositoryError::io("remove sidecar", &location));
        }
        let bytes = sidecar
            .to_json()
            .map_err(|source| RepositoryError::CorruptSidecar {
                path: location.clone(),
                source,
            })?;
        write_atomic(self.fs.as_ref(), &location, &bytes)
            .map_err(RepositoryError::io("write sidecar", &location))
    }

    /// Remove the sidecar of `path`, returning whether one existed.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Io`] when removal fails.
    pub fn delete(&self, path: &Utf8Path) -> Result<bool, RepositoryError> {
        let location = sidecar_path(path);
        match self.fs.remove_file(&location) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(RepositoryError::io("remove sidecar", &location)(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;
    use trailstore_fs::CapRoot;

    struct Scratch {
        _dir: TempDir,
        fs: Arc<dyn RepoFs>,
        store: SidecarStore,
    }

    #[fixture]
    fn scratch() -> Scratch {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        let fs: Arc<dyn RepoFs> = Arc::new(CapRoot::open(&path).expect("open root"));
        let store = SidecarStore::new(Arc::clone(&fs));
        Scratch {
            _dir: dir,
            fs,
            store,
        }
    }

    #[rstest]
    fn missing_sidecars_read_as_empty(scratch: Scratch) {
        let sidecar = scratch.store.read(Utf8Path::new("pic.jpg")).expect("read");
        assert!(sidecar.is_empty());
    }

    #[rstest]
    fn writes_merge_and_keep_unknown_keys(scratch: Scratch) {
        scratch
            .fs
            .write_new(Utf8Path::new("pic.jpg.json"), br#"{"rating": 5, "latitude": 1.0}"#)
            .expect("seed");
        let merged = scratch
            .store
            .write(Utf8Path::new("pic.jpg"), &SidecarUpdate::new().location(43.5, -5.75))
            .expect("write");
        assert_eq!(merged.location(), Some((43.5, -5.75)));

        let stored = scratch.store.read(Utf8Path::new("pic.jpg")).expect("reread");
        assert_eq!(stored, merged);
        assert_eq!(stored.get("rating"), Some(&serde_json::json!(5)));
    }

    #[rstest]
    fn clearing_every_key_removes_the_file(scratch: Scratch) {
        let path = Utf8Path::new("pic.jpg");
        scratch
            .store
            .write(path, &SidecarUpdate::new().set("rating", 3))
            .expect("write");
        scratch
            .store
            .write(path, &SidecarUpdate::new().remove("rating"))
            .expect("clear");
        assert_eq!(scratch.store.read_raw(path).expect("raw"), None);
    }

    #[rstest]
    fn corrupt_sidecars_are_reported(scratch: Scratch) {
        scratch
            .fs
            .write_new(Utf8Path::new("pic.jpg.json"), b"[1, 2]")
            .expect("seed");
        let err = scratch.store.read(Utf8Path::new("pic.jpg")).expect_err("array");
        assert_eq!(err.kind(), ErrorKind::CorruptInput);
    }

    #[rstest]
    fn delete_reports_whether_a_sidecar_existed(scratch: Scratch) {
        let path = Utf8Path::new("pic.jpg");
        assert!(!scratch.store.delete(path).expect("absent"));
        scratch
            .store
            .write(path, &SidecarUpdate::new().set("rating", 3))
            .expect("write");
        assert!(scratch.store.delete(path).expect("present"));
    }
}
