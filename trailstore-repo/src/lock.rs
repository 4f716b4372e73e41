//! In-process per-path lock table.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};

use crate::RepositoryError;

/// Paths currently held by a mutation.
///
/// Acquisition never waits: a path already held yields
/// [`RepositoryError::Conflict`]. Entries disappear when their
/// [`PathGuard`] is dropped, so the table never grows beyond the number of
/// in-flight mutations.
#[derive(Debug, Default)]
pub struct PathLocks {
    held: Mutex<HashSet<Utf8PathBuf>>,
}

impl PathLocks {
    fn table(&self) -> MutexGuard<'_, HashSet<Utf8PathBuf>> {
        // Every update is a single insert or remove; a poisoned set is intact.
        self.held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Take every path in `paths`, or none of them.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Conflict`] naming the first path that is
    /// already held.
    pub fn try_lock(&self, paths: &[&Utf8Path]) -> Result<PathGuard<'_>, RepositoryError> {
        let mut table = self.table();
        if let Some(held) = paths.iter().find(|path| table.contains(**path)) {
            return Err(RepositoryError::Conflict {
                path: (*held).to_path_buf(),
            });
        }
        let mut taken = Vec::with_capacity(paths.len());
        for path in paths {
            if table.insert((*path).to_path_buf()) {
                taken.push((*path).to_path_buf());
            }
        }
        Ok(PathGuard {
            locks: self,
            paths: taken,
        })
    }

    /// Whether `path` is held right now.
    #[must_use]
    pub fn is_locked(&self, path: &Utf8Path) -> bool {
        self.table().contains(path)
    }
}

/// Releases its paths on drop.
#[derive(Debug)]
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    paths: Vec<Utf8PathBuf>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        for path in &self.paths {
            table.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use rstest::rstest;

    #[rstest]
    fn held_paths_conflict_until_released() {
        let locks = PathLocks::default();
        let path = Utf8Path::new("trail/ride.gpx");
        let guard = locks.try_lock(&[path]).expect("first lock");
        let err = locks.try_lock(&[path]).expect_err("second lock");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        drop(guard);
        assert!(!locks.is_locked(path));
        assert!(locks.try_lock(&[path]).is_ok());
    }

    #[rstest]
    fn acquisition_is_all_or_nothing() {
        let locks = PathLocks::default();
        let held = Utf8Path::new("media/pic.jpg");
        let free = Utf8Path::new("trail/ride.gpx");
        let _guard = locks.try_lock(&[held]).expect("lock");
        assert!(locks.try_lock(&[free, held]).is_err());
        assert!(!locks.is_locked(free));
    }

    #[rstest]
    fn duplicate_paths_in_one_request_are_taken_once() {
        let locks = PathLocks::default();
        let path = Utf8Path::new("trail/ride.gpx");
        let guard = locks.try_lock(&[path, path]).expect("lock");
        drop(guard);
        assert!(!locks.is_locked(path));
    }
}
