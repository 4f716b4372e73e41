//! Shared fixtures for repository integration tests.

use std::io;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use tempfile::TempDir;
use trailstore_fs::{CapRoot, DirEntry, EntryKind, RepoFs};
use trailstore_repo::{Repository, RepositoryOptions};

/// `trail` is date-based for GPX, `media` is flat for JPEG.
pub const TRAIL_AND_MEDIA: &str = r##"
[categories.trail]
name = "Trail"
type = "track"
extensions = [".gpx"]
color = "#d9480f"

[categories.media]
name = "Media"
type = "media"
extensions = [".jpg"]
storage_policy = { name = "FlatPolicy" }
"##;

/// A JPEG with no EXIF segment.
pub const BARE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

/// A one-segment GPX track recorded at `time`.
pub fn gpx(time: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="tests" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><time>{time}</time></metadata>
  <trk>
    <name>Ridge</name>
    <trkseg>
      <trkpt lat="43.5" lon="-5.75"><ele>120</ele></trkpt>
      <trkpt lat="43.25" lon="-5.5"><ele>180</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#
    )
}

/// A scratch repository directory.
pub struct Scratch {
    _dir: TempDir,
    pub root: Utf8PathBuf,
}

impl Scratch {
    /// Write `storage.toml` and open the repository over `cap-std`.
    pub fn open(&self, config: &str, options: RepositoryOptions) -> Repository {
        std::fs::write(self.root.join("storage.toml"), config).expect("write storage.toml");
        Repository::open_with_options(&self.root, options).expect("open repository")
    }

    /// Open the repository over a [`FaultyFs`].
    pub fn open_faulty(&self, config: &str, faults: Faults) -> Repository {
        std::fs::write(self.root.join("storage.toml"), config).expect("write storage.toml");
        let fs = FaultyFs {
            inner: CapRoot::open(&self.root).expect("open root"),
            fail_rename_to: faults.fail_rename_to,
            fail_write_to: faults.fail_write_to,
            pauses: Mutex::new(faults.pause_rename_to),
        };
        Repository::open_with(Arc::new(fs), RepositoryOptions::default()).expect("open repository")
    }

    /// Whether `relative` exists below the root.
    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    /// Entries below the root, sorted, excluding `storage.toml`.
    pub fn tree(&self) -> Vec<String> {
        let mut found = Vec::new();
        walk(&self.root, &self.root, &mut found);
        found.sort();
        found
    }
}

fn walk(root: &Utf8Path, dir: &Utf8Path, found: &mut Vec<String>) {
    for entry in dir.read_dir_utf8().expect("read dir") {
        let entry = entry.expect("dir entry");
        let path = entry.path();
        let relative = path.strip_prefix(root).expect("below root").to_string();
        if relative == "storage.toml" {
            continue;
        }
        if path.is_dir() {
            walk(root, path, found);
        }
        found.push(relative);
    }
}

#[fixture]
pub fn scratch() -> Scratch {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().join("repo")).expect("utf-8 path");
    std::fs::create_dir(&root).expect("create root");
    Scratch { _dir: dir, root }
}

/// Faults injected by [`FaultyFs`].
#[derive(Default)]
pub struct Faults {
    /// Renames onto this path fail.
    pub fail_rename_to: Option<Utf8PathBuf>,
    /// Writes of this path fail, including staging writes beside it.
    pub fail_write_to: Option<Utf8PathBuf>,
    /// The first rename onto each path meets its barrier twice: once on
    /// arrival, once before proceeding. Pauses run before failures.
    pub pause_rename_to: Vec<(Utf8PathBuf, Arc<Barrier>)>,
}

/// A `cap-std` root with injectable write and rename faults.
pub struct FaultyFs {
    inner: CapRoot,
    fail_rename_to: Option<Utf8PathBuf>,
    fail_write_to: Option<Utf8PathBuf>,
    pauses: Mutex<Vec<(Utf8PathBuf, Arc<Barrier>)>>,
}

impl FaultyFs {
    fn take_pause(&self, to: &Utf8Path) -> Option<Arc<Barrier>> {
        let mut pauses = self.pauses.lock().unwrap_or_else(PoisonError::into_inner);
        let index = pauses.iter().position(|(target, _)| target == to)?;
        Some(pauses.remove(index).1)
    }

    fn write_fails(&self, path: &Utf8Path) -> bool {
        let Some(target) = &self.fail_write_to else {
            return false;
        };
        if path == target {
            return true;
        }
        let staged_beside = target
            .file_name()
            .zip(path.file_name())
            .is_some_and(|(name, candidate)| {
                candidate.starts_with(&format!(".{name}.")) && candidate.ends_with(".tmp")
            });
        staged_beside && path.parent() == target.parent()
    }
}

impl RepoFs for FaultyFs {
    fn kind(&self, path: &Utf8Path) -> io::Result<Option<EntryKind>> {
        self.inner.kind(path)
    }
    fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }
    fn write_new(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        if self.write_fails(path) {
            return Err(io::Error::other("simulated write failure"));
        }
        self.inner.write_new(path, contents)
    }
    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        if let Some(barrier) = self.take_pause(to) {
            barrier.wait();
            barrier.wait();
        }
        if self.fail_rename_to.as_deref() == Some(to) {
            return Err(io::Error::other("simulated rename failure"));
        }
        self.inner.rename(from, to)
    }
    fn copy_synced(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<u64> {
        self.inner.copy_synced(from, to)
    }
    fn file_len(&self, path: &Utf8Path) -> io::Result<u64> {
        self.inner.file_len(path)
    }
    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        self.inner.remove_file(path)
    }
    fn create_dir(&self, path: &Utf8Path) -> io::Result<()> {
        self.inner.create_dir(path)
    }
    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()> {
        self.inner.remove_dir(path)
    }
    fn read_dir(&self, path: &Utf8Path) -> io::Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }
}

/// Every listed path, failing the test on listing errors.
pub fn listed(repo: &Repository) -> Vec<Utf8PathBuf> {
    repo.list()
        .collect::<Result<Vec<_>, _>>()
        .expect("list repository")
}
