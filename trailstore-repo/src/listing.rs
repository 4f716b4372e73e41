//! Lazy traversal of managed files.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use trailstore_core::{Registry, extension_of};
use trailstore_fs::{EntryKind, RepoFs};

use crate::RepositoryError;

/// Iterator over the relative paths of every managed file.
///
/// Directories are read one at a time as the iterator advances, in name
/// order, files before subdirectories. Hidden entries (staging files among
/// them) and files whose extension no category accepts are skipped, which
/// also excludes sidecars. A directory removed while the walk is in
/// progress is skipped silently; other read failures are yielded as errors
/// and the walk continues. Calling [`Repository::list`](crate::Repository::list)
/// again restarts from the root.
pub struct ManagedFiles {
    fs: Arc<dyn RepoFs>,
    registry: Arc<Registry>,
    pending: Vec<Utf8PathBuf>,
    ready: VecDeque<Utf8PathBuf>,
}

impl std::fmt::Debug for ManagedFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedFiles")
            .field("pending", &self.pending)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl ManagedFiles {
    pub(crate) fn new(fs: Arc<dyn RepoFs>, registry: Arc<Registry>) -> Self {
        Self {
            fs,
            registry,
            pending: vec![Utf8PathBuf::new()],
            ready: VecDeque::new(),
        }
    }

    fn expand(&mut self, dir: &Utf8Path) -> io::Result<()> {
        let entries = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{dir} vanished during listing");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let mut subdirs = Vec::new();
        for entry in entries {
            if entry.name.starts_with('.') {
                continue;
            }
            let path = dir.join(&entry.name);
            match entry.kind {
                EntryKind::Directory => subdirs.push(path),
                EntryKind::File if self.is_managed(&entry.name) => self.ready.push_back(path),
                EntryKind::File | EntryKind::Other => {}
            }
        }
        // Reversed so that popping visits subdirectories in name order.
        self.pending.extend(subdirs.into_iter().rev());
        Ok(())
    }

    fn is_managed(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|extension| self.registry.is_managed_extension(&extension))
    }
}

impl Iterator for ManagedFiles {
    type Item = Result<Utf8PathBuf, RepositoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(path) = self.ready.pop_front() {
                return Some(Ok(path));
            }
            let dir = self.pending.pop()?;
            if let Err(err) = self.expand(&dir) {
                return Some(Err(RepositoryError::io("list", &dir)(err)));
            }
        }
    }
}
