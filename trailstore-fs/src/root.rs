//! The [`RepoFs`] seam and its `cap-std` implementation.

use std::fmt;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::{FileType, OpenOptions};
use cap_std::{ambient_authority, fs_utf8};
use log::{debug, warn};

use crate::ensure_dir;

static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Classification of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Symlinks, sockets and anything else the repository does not manage.
    Other,
}

impl EntryKind {
    fn classify(file_type: FileType) -> Self {
        if file_type.is_file() {
            Self::File
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::Other
        }
    }
}

/// A single entry returned by [`RepoFs::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name within its directory.
    pub name: String,
    /// Entry classification.
    pub kind: EntryKind,
}

/// Filesystem operations the repository engine performs, relative to its root.
///
/// An empty path addresses the root itself.
pub trait RepoFs: Send + Sync {
    /// Classify `path`, returning `None` when nothing exists there.
    fn kind(&self, path: &Utf8Path) -> io::Result<Option<EntryKind>>;
    /// Read a whole file.
    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>>;
    /// Create a file that must not already exist, write `contents` and sync it.
    fn write_new(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()>;
    /// Rename a file within the repository.
    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()>;
    /// Copy `from` into a new file at `to` and sync it, returning the bytes copied.
    fn copy_synced(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<u64>;
    /// Size of the file at `path` in bytes.
    fn file_len(&self, path: &Utf8Path) -> io::Result<u64>;
    /// Remove a file.
    fn remove_file(&self, path: &Utf8Path) -> io::Result<()>;
    /// Create a single directory.
    fn create_dir(&self, path: &Utf8Path) -> io::Result<()>;
    /// Remove an empty directory.
    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()>;
    /// List a directory, sorted by entry name.
    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<DirEntry>>;
}

/// Repository root backed by a `cap-std` directory handle.
pub struct CapRoot {
    root: Utf8PathBuf,
    dir: fs_utf8::Dir,
}

impl fmt::Debug for CapRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapRoot")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl CapRoot {
    /// Open `root`, creating it when it does not exist yet.
    pub fn open(root: &Utf8Path) -> io::Result<Self> {
        ensure_dir(root)?;
        let dir = fs_utf8::Dir::open_ambient_dir(root, ambient_authority())?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Ambient location of the repository root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

fn at(path: &Utf8Path) -> &Utf8Path {
    if path.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        path
    }
}

fn create_new_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    options
}

impl RepoFs for CapRoot {
    fn kind(&self, path: &Utf8Path) -> io::Result<Option<EntryKind>> {
        match self.dir.symlink_metadata(at(path)) {
            Ok(meta) => Ok(Some(EntryKind::classify(meta.file_type()))),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        self.dir.read(path)
    }

    fn write_new(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        let mut file = self.dir.open_with(path, &create_new_options())?;
        file.write_all(contents)?;
        file.sync_all()
    }

    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        self.dir.rename(from, &self.dir, to)
    }

    fn copy_synced(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<u64> {
        let mut source = self.dir.open(from)?;
        let mut target = self.dir.open_with(to, &create_new_options())?;
        let copied = io::copy(&mut source, &mut target)?;
        target.sync_all()?;
        Ok(copied)
    }

    fn file_len(&self, path: &Utf8Path) -> io::Result<u64> {
        self.dir.metadata(path).map(|meta| meta.len())
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        self.dir.remove_file(path)
    }

    fn create_dir(&self, path: &Utf8Path) -> io::Result<()> {
        self.dir.create_dir(path)
    }

    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()> {
        self.dir.remove_dir(path)
    }

    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<DirEntry>> {
        let entries = if path.as_str().is_empty() {
            self.dir.entries()?
        } else {
            self.dir.read_dir(path)?
        };
        let mut listed = Vec::new();
        for item in entries {
            let entry = item?;
            listed.push(DirEntry {
                name: entry.file_name()?,
                kind: EntryKind::classify(entry.file_type()?),
            });
        }
        listed.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(listed)
    }
}

/// Create `path` and any missing ancestors, returning the directories that
/// did not exist before, shallowest first.
///
/// When creation fails part-way, the directories created so far are removed
/// again before the error is returned.
pub fn create_dir_all(fs: &dyn RepoFs, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut created = Vec::new();
    let mut current = Utf8PathBuf::new();
    for component in path.components() {
        current.push(component.as_str());
        if let Err(err) = create_one(fs, &current, &mut created) {
            for dir in created.iter().rev() {
                if let Err(cleanup) = fs.remove_dir(dir) {
                    debug!("leaving directory {dir} behind: {cleanup}");
                }
            }
            return Err(err);
        }
    }
    Ok(created)
}

fn create_one(
    fs: &dyn RepoFs,
    dir: &Utf8Path,
    created: &mut Vec<Utf8PathBuf>,
) -> io::Result<()> {
    match fs.kind(dir)? {
        Some(EntryKind::Directory) => Ok(()),
        Some(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{dir} exists and is not a directory"),
        )),
        None => match fs.create_dir(dir) {
            Ok(()) => {
                created.push(dir.to_path_buf());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err),
        },
    }
}

/// Hidden staging name next to `path`, unique within this process.
#[must_use]
pub fn temp_sibling(path: &Utf8Path) -> Utf8PathBuf {
    let name = path.file_name().unwrap_or("staged");
    let sequence = STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let staged = format!(".{name}.{}-{sequence}.tmp", process::id());
    match path.parent() {
        Some(parent) => parent.join(staged),
        None => Utf8PathBuf::from(staged),
    }
}

/// Remove a file, treating an already-missing file as success.
pub fn discard_file(fs: &dyn RepoFs, path: &Utf8Path) -> io::Result<()> {
    match fs.remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Replace `path` with `contents` through a staging file and an atomic rename.
///
/// Readers observe either the previous file or the complete new one.
pub fn write_atomic(fs: &dyn RepoFs, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let staging = temp_sibling(path);
    let outcome = fs
        .write_new(&staging, contents)
        .and_then(|()| fs.rename(&staging, path));
    if let Err(err) = outcome {
        if let Err(cleanup) = discard_file(fs, &staging) {
            warn!("failed to remove staging file {staging}: {cleanup}");
        }
        return Err(err);
    }
    Ok(())
}
