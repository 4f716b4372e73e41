//! Photos with optional EXIF position and capture date.

use std::io::Cursor;

use chrono::{DateTime, NaiveDate, Utc};
use exif::{Exif, In, Tag, Value};
use geo::Coord;
use log::{debug, warn};
use trailstore_core::{ContentKind, Geometry};

use crate::{FormatError, FormatHandler, Parsed, Source};

const FORMAT: &str = "photo";

/// Extensions handled by [`Photo`].
pub const PHOTO_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".tif", ".tiff", ".webp", ".heic"];

/// Degrees, minutes and seconds divisors.
const DMS_DIVISION: [f64; 3] = [1.0, 60.0, 3600.0];

/// Handler for still images.
///
/// The container signature must match a known image format. EXIF metadata
/// is optional: a photo without it parses to an empty geometry and no date.
#[derive(Debug, Clone, Copy, Default)]
pub struct Photo;

impl FormatHandler for Photo {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Media
    }

    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError> {
        if !has_image_signature(source.bytes) {
            return Err(FormatError::corrupt(FORMAT, "content is not a recognised image"));
        }
        let Some(exif) = read_exif(source) else {
            return Ok(Parsed::empty());
        };
        let geometry = location(&exif).map_or(Geometry::Empty, Geometry::Point);
        Ok(Parsed {
            date: capture_date(&exif),
            geometry,
        })
    }
}

fn has_image_signature(bytes: &[u8]) -> bool {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    let heif = bytes
        .get(4..12)
        .is_some_and(|brand| brand.starts_with(b"ftyp") && is_heif_brand(brand.get(4..).unwrap_or_default()));
    bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(PNG)
        || bytes.starts_with(b"II*\0")
        || bytes.starts_with(b"MM\0*")
        || (bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()))
        || heif
}

fn is_heif_brand(brand: &[u8]) -> bool {
    [b"heic", b"heix", b"hevc", b"heim", b"heis", b"mif1", b"msf1"]
        .iter()
        .any(|known| brand == known.as_slice())
}

fn read_exif(source: &Source<'_>) -> Option<Exif> {
    match exif::Reader::new().read_from_container(&mut Cursor::new(source.bytes)) {
        Ok(exif) => Some(exif),
        Err(
            exif::Error::NotFound(_) | exif::Error::NotSupported(_) | exif::Error::BlankValue(_),
        ) => {
            debug!("{} has no EXIF metadata", source.file_name);
            None
        }
        Err(err) => {
            warn!("ignoring unreadable EXIF metadata in {}: {err}", source.file_name);
            None
        }
    }
}

fn location(exif: &Exif) -> Option<Coord<f64>> {
    let latitude = signed_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = signed_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    let valid = latitude.abs() <= 90.0 && longitude.abs() <= 180.0;
    valid.then_some(Coord {
        x: longitude,
        y: latitude,
    })
}

fn signed_degrees(exif: &Exif, value: Tag, reference: Tag, negative: u8) -> Option<f64> {
    let Value::Rational(parts) = &exif.get_field(value, In::PRIMARY)?.value else {
        return None;
    };
    if parts.len() != DMS_DIVISION.len() || parts.iter().any(|part| part.denom == 0) {
        return None;
    }
    let magnitude: f64 = parts
        .iter()
        .zip(DMS_DIVISION)
        .map(|(part, divisor)| part.to_f64() / divisor)
        .sum();
    let negated = match exif.get_field(reference, In::PRIMARY).map(|field| &field.value) {
        Some(Value::Ascii(values)) => values
            .first()
            .and_then(|text| text.first())
            .is_some_and(|letter| letter.eq_ignore_ascii_case(&negative)),
        _ => false,
    };
    Some(if negated { -magnitude } else { magnitude })
}

fn capture_date(exif: &Exif) -> Option<DateTime<Utc>> {
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .find_map(|tag| match &exif.get_field(tag, In::PRIMARY)?.value {
            Value::Ascii(values) => values.first().and_then(|text| exif_date(text)),
            _ => None,
        })
}

fn exif_date(text: &[u8]) -> Option<DateTime<Utc>> {
    let stamp = exif::DateTime::from_ascii(text).ok()?;
    NaiveDate::from_ymd_opt(
        i32::from(stamp.year),
        u32::from(stamp.month),
        u32::from(stamp.day),
    )?
    .and_hms_opt(
        u32::from(stamp.hour),
        u32::from(stamp.minute),
        u32::from(stamp.second),
    )
    .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use exif::experimental::Writer;
    use exif::{Field, Rational};
    use rstest::rstest;

    fn ascii(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    fn dms(tag: Tag, degrees: u32, minutes: u32, seconds: u32) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![
                Rational::from((degrees, 1)),
                Rational::from((minutes, 1)),
                Rational::from((seconds, 1)),
            ]),
        }
    }

    /// A minimal JPEG: SOI, an APP1 segment carrying `fields`, EOI.
    fn jpeg_with(fields: &[Field]) -> Vec<u8> {
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).expect("encode exif");
        let payload = [b"Exif\0\0".as_slice(), tiff.get_ref()].concat();
        let length = u16::try_from(payload.len() + 2).expect("segment fits");
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&length.to_be_bytes());
        jpeg.extend_from_slice(&payload);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[rstest]
    fn gps_and_capture_date_are_read() {
        let bytes = jpeg_with(&[
            ascii(Tag::DateTime, "2020:01:01 00:00:00"),
            ascii(Tag::DateTimeOriginal, "2023:05:01 08:00:00"),
            dms(Tag::GPSLatitude, 43, 30, 0),
            ascii(Tag::GPSLatitudeRef, "N"),
            dms(Tag::GPSLongitude, 5, 45, 0),
            ascii(Tag::GPSLongitudeRef, "W"),
        ]);
        let parsed = Photo.parse(&Source::new("summit.jpg", &bytes)).expect("parse");
        assert_eq!(parsed.geometry, Geometry::Point(Coord { x: -5.75, y: 43.5 }));
        assert_eq!(
            Photo.primary_date(&parsed),
            Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).single()
        );
    }

    #[rstest]
    fn photos_without_exif_parse_to_nothing() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xD9];
        let parsed = Photo.parse(&Source::new("plain.jpg", &bytes)).expect("parse");
        assert_eq!(parsed, Parsed::empty());
    }

    #[rstest]
    #[case(b"\x89PNG\r\n\x1a\n".as_slice())]
    #[case(b"II*\0\x08\0\0\0".as_slice())]
    #[case(b"RIFF\0\0\0\0WEBPVP8 ".as_slice())]
    #[case(b"\0\0\0\x18ftypheic\0\0\0\0".as_slice())]
    fn known_containers_are_accepted(#[case] bytes: &[u8]) {
        assert!(has_image_signature(bytes));
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"<gpx></gpx>".as_slice())]
    #[case(b"\0\0\0\x18ftypmp42".as_slice())]
    fn other_content_is_corrupt(#[case] bytes: &[u8]) {
        let err = Photo
            .parse(&Source::new("fake.jpg", bytes))
            .expect_err("not an image");
        assert_eq!(err.format(), "photo");
    }
}
