//! Undo journal for multi-step mutations.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, error};
use trailstore_fs::{RepoFs, create_dir_all, discard_file, relocate, write_atomic};

/// A compensating action recorded after a successful step.
#[derive(Debug)]
enum Undo {
    /// A file was created at this path.
    RemoveFile(Utf8PathBuf),
    /// A file was moved from `to` to `from`.
    MoveBack { from: Utf8PathBuf, to: Utf8PathBuf },
    /// A directory was created.
    RemoveDir(Utf8PathBuf),
    /// A file with these contents was removed.
    RestoreFile { path: Utf8PathBuf, contents: Vec<u8> },
}

/// Linear record of the filesystem changes made by one operation.
///
/// [`Journal::run`] replays the record in reverse when the operation fails,
/// restoring the tree to its state before the first mutation.
pub(crate) struct Journal<'fs> {
    fs: &'fs dyn RepoFs,
    entries: Vec<Undo>,
}

impl<'fs> Journal<'fs> {
    /// Run `operation`, rolling back everything it recorded if it fails.
    pub(crate) fn run<T, E, F>(fs: &'fs dyn RepoFs, operation: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let mut journal = Self {
            fs,
            entries: Vec::new(),
        };
        match operation(&mut journal) {
            Ok(value) => Ok(value),
            Err(err) => {
                journal.roll_back();
                Err(err)
            }
        }
    }

    pub(crate) fn created_file(&mut self, path: &Utf8Path) {
        self.entries.push(Undo::RemoveFile(path.to_path_buf()));
    }

    pub(crate) fn created_dirs(&mut self, dirs: Vec<Utf8PathBuf>) {
        self.entries.extend(dirs.into_iter().map(Undo::RemoveDir));
    }

    pub(crate) fn moved(&mut self, from: &Utf8Path, to: &Utf8Path) {
        self.entries.push(Undo::MoveBack {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }

    pub(crate) fn removed_file(&mut self, path: &Utf8Path, contents: Vec<u8>) {
        self.entries.push(Undo::RestoreFile {
            path: path.to_path_buf(),
            contents,
        });
    }

    /// Forget a created file that a later step consumed, such as a staging
    /// file renamed into place.
    pub(crate) fn consumed(&mut self, path: &Utf8Path) {
        self.entries
            .retain(|entry| !matches!(entry, Undo::RemoveFile(created) if created == path));
    }

    /// Create `dir` and run `step`, which writes into it.
    ///
    /// Another operation's rollback or pruning may remove `dir` once it is
    /// empty, so a step failing with `NotFound` gets the directory recreated
    /// and one retry.
    pub(crate) fn within_dir<T>(
        &mut self,
        dir: &Utf8Path,
        mut step: impl FnMut() -> io::Result<T>,
    ) -> io::Result<T> {
        self.created_dirs(create_dir_all(self.fs, dir)?);
        match step() {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{dir} vanished before use, recreating it");
                self.created_dirs(create_dir_all(self.fs, dir)?);
                step()
            }
            outcome => outcome,
        }
    }

    /// Directories recorded as created, shallowest first.
    pub(crate) fn created_directories(&self) -> impl DoubleEndedIterator<Item = &Utf8Path> {
        self.entries.iter().filter_map(|entry| match entry {
            Undo::RemoveDir(dir) => Some(dir.as_path()),
            _ => None,
        })
    }

    fn roll_back(self) {
        let fs = self.fs;
        for entry in self.entries.into_iter().rev() {
            debug!("rolling back {entry:?}");
            if let Err(err) = undo(fs, &entry) {
                error!("rollback step {entry:?} failed: {err}");
            }
        }
    }
}

fn undo(fs: &dyn RepoFs, entry: &Undo) -> io::Result<()> {
    match entry {
        Undo::RemoveFile(path) => discard_file(fs, path),
        Undo::MoveBack { from, to } => relocate(fs, to, from).map(|_| ()),
        Undo::RemoveDir(dir) => match fs.remove_dir(dir) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            outcome => outcome,
        },
        Undo::RestoreFile { path, contents } => write_atomic(fs, path, contents),
    }
}

/// Remove directories from `created` that ended up empty, deepest first.
///
/// Used after a successful operation whose provisional destination differed
/// from its final one. Directories that still hold entries are kept.
pub(crate) fn prune_empty<'a>(fs: &dyn RepoFs, created: impl DoubleEndedIterator<Item = &'a Utf8Path>) {
    for dir in created.rev() {
        match fs.read_dir(dir) {
            Ok(entries) if entries.is_empty() => {
                if let Err(err) = fs.remove_dir(dir) {
                    debug!("keeping directory {dir}: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => debug!("keeping directory {dir}: {err}"),
        }
    }
}
