//! Zipped KML.

use std::io::{Cursor, Read};

use log::debug;
use trailstore_core::{ContentKind, Geometry};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::kml::read_document;
use crate::{FormatError, FormatHandler, Parsed, Source};

const FORMAT: &str = "kmz";

/// Handler for `.kmz` archives. Every `.kml` member is read as KML.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kmz;

impl FormatHandler for Kmz {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Track
    }

    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError> {
        let archive_error = |source: ZipError| FormatError::Archive {
            format: FORMAT,
            source,
        };
        let mut archive = ZipArchive::new(Cursor::new(source.bytes)).map_err(archive_error)?;
        let mut date = None;
        let mut lines = Vec::new();
        let mut documents = 0_usize;

        for index in 0..archive.len() {
            let mut member = archive.by_index(index).map_err(archive_error)?;
            if !member.is_file() || !member.name().to_ascii_lowercase().ends_with(".kml") {
                continue;
            }
            debug!("reading {} from {}", member.name(), source.file_name);
            let mut content = Vec::new();
            member
                .read_to_end(&mut content)
                .map_err(|err| archive_error(ZipError::Io(err)))?;
            let document = read_document(FORMAT, &content)?;
            date = date.or(document.date);
            lines.extend(document.lines);
            documents += 1;
        }

        if documents == 0 {
            return Err(FormatError::corrupt(FORMAT, "archive contains no KML document"));
        }
        Ok(Parsed {
            date,
            geometry: Geometry::Lines(lines),
        })
    }
}
