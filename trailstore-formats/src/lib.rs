//! Format handlers for trailstore and the dispatcher that selects them.
//!
//! A [`FormatHandler`] is a stateless function of a file's bytes: it parses
//! the content, reports a primary date and turns the parse result into a
//! [`GeographicFeature`]. The [`FormatDispatcher`] maps extensions to
//! handlers; supporting a new format means registering one more handler.
//!
//! # Examples
//!
//! ```
//! use trailstore_formats::{FormatDispatcher, Source};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = FormatDispatcher::with_defaults();
//! let handler = dispatcher.handler_for(".gpx").ok_or("gpx is registered")?;
//! let gpx = br#"<gpx><trk><trkseg>
//!     <trkpt lat="43.5" lon="-5.75"><time>2024-01-15T09:30:00Z</time></trkpt>
//! </trkseg></trk></gpx>"#;
//! let parsed = handler.parse(&Source::new("ride.gpx", gpx))?;
//! assert!(handler.primary_date(&parsed).is_some());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod dispatcher;
mod error;
mod filename_date;
mod fit;
mod gpx;
mod kml;
mod kmz;
mod photo;
mod video;
mod xml;
mod zone;

use chrono::{DateTime, Utc};
use trailstore_core::{ContentKind, GeographicFeature, Geometry};

pub use dispatcher::FormatDispatcher;
pub use error::FormatError;
pub use filename_date::date_from_file_name;
pub use fit::Fit;
pub use gpx::Gpx;
pub use kml::Kml;
pub use kmz::Kmz;
pub use photo::{PHOTO_EXTENSIONS, Photo};
pub use video::{VIDEO_EXTENSIONS, Video};
pub use zone::GeoJsonZone;

/// Content handed to a handler.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    /// File name, used by handlers that read dates from names.
    pub file_name: &'a str,
    /// Raw file content.
    pub bytes: &'a [u8],
}

impl<'a> Source<'a> {
    /// Bundle a file name with its content.
    #[must_use]
    pub const fn new(file_name: &'a str, bytes: &'a [u8]) -> Self {
        Self { file_name, bytes }
    }
}

/// Result of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// Primary date found in the content or its name.
    pub date: Option<DateTime<Utc>>,
    /// Geometry found in the content.
    pub geometry: Geometry,
}

impl Parsed {
    /// A parse result without geometry or date.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            date: None,
            geometry: Geometry::Empty,
        }
    }
}

/// Format-specific parser.
pub trait FormatHandler: Send + Sync {
    /// Short format name, such as `gpx`.
    fn name(&self) -> &'static str;

    /// Content kind the format belongs to.
    fn kind(&self) -> ContentKind;

    /// Parse `source`.
    ///
    /// # Errors
    /// Returns [`FormatError`] when the content does not conform to the
    /// format.
    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError>;

    /// Date used for placement.
    fn primary_date(&self, parsed: &Parsed) -> Option<DateTime<Utc>> {
        parsed.date
    }

    /// Geographic feature for a parsed file.
    fn to_feature(&self, file_name: &str, parsed: Parsed) -> GeographicFeature {
        GeographicFeature {
            name: file_name.to_owned(),
            kind: self.kind(),
            format: self.name(),
            date: self.primary_date(&parsed),
            geometry: parsed.geometry,
            category: None,
        }
    }
}
