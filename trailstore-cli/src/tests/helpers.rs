//! Scratch repositories and input files for CLI tests.

use camino::Utf8PathBuf;
use serde_json::Value;
use tempfile::TempDir;

const STORAGE: &str = r#"
[categories.trail]
name = "Trail"
type = "track"
extensions = [".gpx"]

[categories.media]
name = "Media"
type = "media"
extensions = [".jpg"]
storage_policy = { name = "FlatPolicy" }
"#;

const RIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="tests" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><time>2024-01-15T09:30:00Z</time></metadata>
  <trk>
    <name>Ridge</name>
    <trkseg>
      <trkpt lat="43.5" lon="-5.75"><ele>120</ele></trkpt>
      <trkpt lat="43.25" lon="-5.5"><ele>180</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

/// A repository with `trail` (GPX, by date) and `media` (JPEG, flat)
/// categories, next to an inbox holding one file of each.
pub(super) struct Workspace {
    _dir: TempDir,
    repo: Utf8PathBuf,
    inbox: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let repo = base.join("repo");
        let inbox = base.join("inbox");
        std::fs::create_dir(&repo).expect("create repo");
        std::fs::create_dir(&inbox).expect("create inbox");
        std::fs::write(repo.join("storage.toml"), STORAGE).expect("write storage.toml");
        std::fs::write(inbox.join("ride.gpx"), RIDE).expect("write gpx");
        std::fs::write(inbox.join("photo.jpg"), [0xFF, 0xD8, 0xFF, 0xD9]).expect("write jpeg");
        Self {
            _dir: dir,
            repo,
            inbox,
        }
    }

    pub(super) fn repo(&self) -> &Utf8PathBuf {
        &self.repo
    }

    pub(super) fn ride(&self) -> Utf8PathBuf {
        self.inbox.join("ride.gpx")
    }

    pub(super) fn photo(&self) -> Utf8PathBuf {
        self.inbox.join("photo.jpg")
    }
}

/// Decode one command's JSON output.
pub(super) fn output(buffer: &[u8]) -> Value {
    serde_json::from_slice(buffer).expect("command output is JSON")
}
