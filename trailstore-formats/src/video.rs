//! Video files. Location and date come from the sidecar only.

use trailstore_core::ContentKind;

use crate::{FormatError, FormatHandler, Parsed, Source};

/// Extensions handled by [`Video`].
pub const VIDEO_EXTENSIONS: [&str; 5] = [".mp4", ".mov", ".avi", ".mkv", ".webm"];

/// Handler for video files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Video;

impl FormatHandler for Video {
    fn name(&self) -> &'static str {
        "video"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Media
    }

    fn parse(&self, _source: &Source<'_>) -> Result<Parsed, FormatError> {
        Ok(Parsed::empty())
    }
}
