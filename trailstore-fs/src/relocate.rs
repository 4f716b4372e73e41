//! Moving files inside a repository, across filesystem boundaries if needed.

use std::io;

use camino::Utf8Path;
use log::{error, warn};

use crate::root::{RepoFs, discard_file};

/// How [`relocate`] moved a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// A single atomic rename.
    Renamed,
    /// Copy, sync, size check, then removal of the source.
    Copied,
}

/// Move `from` to `to`, which must not exist.
///
/// A plain rename is attempted first. When the two paths live on different
/// filesystems the file is copied, synced and compared by size before the
/// source is removed; any failure along that path removes the partial copy
/// and leaves the source untouched.
pub fn relocate(fs: &dyn RepoFs, from: &Utf8Path, to: &Utf8Path) -> io::Result<Relocation> {
    match fs.rename(from, to) {
        Ok(()) => Ok(Relocation::Renamed),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            warn!("{from} and {to} are on different filesystems, falling back to copy");
            copy_then_remove(fs, from, to)?;
            Ok(Relocation::Copied)
        }
        Err(err) => Err(err),
    }
}

fn copy_then_remove(fs: &dyn RepoFs, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    if fs.kind(to)?.is_some() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{to} already exists"),
        ));
    }
    let expected = fs.file_len(from)?;
    if let Err(err) = copy_verified(fs, from, to, expected) {
        drop_partial_copy(fs, to);
        return Err(err);
    }
    if let Err(err) = fs.remove_file(from) {
        drop_partial_copy(fs, to);
        return Err(err);
    }
    Ok(())
}

fn copy_verified(fs: &dyn RepoFs, from: &Utf8Path, to: &Utf8Path, expected: u64) -> io::Result<()> {
    fs.copy_synced(from, to)?;
    let written = fs.file_len(to)?;
    if written == expected {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "copied {written} of {expected} bytes from {from} to {to}"
        )))
    }
}

fn drop_partial_copy(fs: &dyn RepoFs, to: &Utf8Path) {
    if let Err(err) = discard_file(fs, to) {
        error!("failed to remove partial copy {to}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::{CapRoot, DirEntry, EntryKind};
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    /// Pretends every rename crosses a device boundary and can fail chosen steps.
    struct SplitDevices {
        inner: CapRoot,
        fail_remove: bool,
        truncate_copy: bool,
    }

    impl RepoFs for SplitDevices {
        fn kind(&self, path: &Utf8Path) -> io::Result<Option<EntryKind>> {
            self.inner.kind(path)
        }
        fn read(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
            self.inner.read(path)
        }
        fn write_new(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
            self.inner.write_new(path, contents)
        }
        fn rename(&self, _from: &Utf8Path, _to: &Utf8Path) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::CrossesDevices))
        }
        fn copy_synced(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<u64> {
            if self.truncate_copy {
                let contents = self.inner.read(from)?;
                let half = contents.get(..contents.len() / 2).unwrap_or_default();
                self.inner.write_new(to, half)?;
                return Ok(half.len() as u64);
            }
            self.inner.copy_synced(from, to)
        }
        fn file_len(&self, path: &Utf8Path) -> io::Result<u64> {
            self.inner.file_len(path)
        }
        fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
            if self.fail_remove && path.as_str() == "source.gpx" {
                return Err(io::Error::other("simulated removal failure"));
            }
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

    struct Scratch {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Scratch {
        fn fs(&self, fail_remove: bool, truncate_copy: bool) -> SplitDevices {
            SplitDevices {
                inner: CapRoot::open(&self.root).expect("open root"),
                fail_remove,
                truncate_copy,
            }
        }
    }

    #[fixture]
    fn scratch() -> Scratch {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        let cap = CapRoot::open(&root).expect("open root");
        cap.write_new(Utf8Path::new("source.gpx"), b"<gpx>ride</gpx>")
            .expect("seed source");
        Scratch { _dir: dir, root }
    }

    #[rstest]
    fn same_device_rename_is_used_when_possible(scratch: Scratch) {
        let fs = CapRoot::open(&scratch.root).expect("open root");
        let outcome = relocate(&fs, Utf8Path::new("source.gpx"), Utf8Path::new("moved.gpx"))
            .expect("rename");
        assert_eq!(outcome, Relocation::Renamed);
        assert_eq!(fs.kind(Utf8Path::new("source.gpx")).expect("stat"), None);
    }

    #[rstest]
    fn cross_device_moves_copy_then_remove(scratch: Scratch) {
        let fs = scratch.fs(false, false);
        let outcome = relocate(&fs, Utf8Path::new("source.gpx"), Utf8Path::new("moved.gpx"))
            .expect("copy fallback");
        assert_eq!(outcome, Relocation::Copied);
        assert_eq!(fs.read(Utf8Path::new("moved.gpx")).expect("read"), b"<gpx>ride</gpx>");
        assert_eq!(fs.kind(Utf8Path::new("source.gpx")).expect("stat"), None);
    }

    #[rstest]
    #[case(true, false)]
    #[case(false, true)]
    fn failed_fallback_keeps_source_and_drops_copy(
        scratch: Scratch,
        #[case] fail_remove: bool,
        #[case] truncate_copy: bool,
    ) {
        let fs = scratch.fs(fail_remove, truncate_copy);
        relocate(&fs, Utf8Path::new("source.gpx"), Utf8Path::new("moved.gpx"))
            .expect_err("fallback should fail");
        assert_eq!(fs.read(Utf8Path::new("source.gpx")).expect("read"), b"<gpx>ride</gpx>");
        assert_eq!(fs.kind(Utf8Path::new("moved.gpx")).expect("stat"), None);
    }

    #[rstest]
    fn fallback_never_clobbers_an_existing_target(scratch: Scratch) {
        let fs = scratch.fs(false, false);
        fs.write_new(Utf8Path::new("moved.gpx"), b"keep me").expect("seed target");
        let err = relocate(&fs, Utf8Path::new("source.gpx"), Utf8Path::new("moved.gpx"))
            .expect_err("occupied target");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs.read(Utf8Path::new("moved.gpx")).expect("read"), b"keep me");
    }
}
