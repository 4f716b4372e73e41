//! KML documents with `LineString` or `gx:Track` placemarks.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use trailstore_core::{ContentKind, Geometry, TrackLine, TrackPoint, parse_timestamp};

use crate::xml::{XmlEvents, local_name};
use crate::{FormatError, FormatHandler, Parsed, Source};

const FORMAT: &str = "kml";
const UNNAMED: &str = "Unnamed Track";

/// Handler for `.kml` files.
///
/// Every placemark line becomes one line named after the placemark. The
/// primary date is the first `when` timestamp in the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kml;

impl FormatHandler for Kml {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Track
    }

    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError> {
        let document = read_document(FORMAT, source.bytes)?;
        Ok(Parsed {
            date: document.date,
            geometry: Geometry::Lines(document.lines),
        })
    }
}

/// Lines and first timestamp of one KML document.
#[derive(Debug, Default)]
pub(crate) struct KmlDocument {
    pub(crate) date: Option<DateTime<Utc>>,
    pub(crate) lines: Vec<TrackLine>,
}

#[derive(Default)]
struct Placemark {
    name: Option<String>,
    lines: Vec<Vec<TrackPoint>>,
}

/// Read a KML document, tagging errors with `format`.
pub(crate) fn read_document(format: &'static str, bytes: &[u8]) -> Result<KmlDocument, FormatError> {
    let mut events = XmlEvents::new(format, bytes);
    let mut document = KmlDocument::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut placemark: Option<Placemark> = None;
    let mut gx_track: Option<Vec<TrackPoint>> = None;
    let mut seen_root = false;

    loop {
        match events.next()? {
            Event::Start(element) => {
                let name = local_name(&element);
                if !seen_root {
                    if name != b"kml" {
                        return Err(FormatError::corrupt(format, "document has no kml element"));
                    }
                    seen_root = true;
                }
                match name.as_slice() {
                    b"Placemark" => placemark = Some(Placemark::default()),
                    b"Track" if placemark.is_some() => gx_track = Some(Vec::new()),
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(element) if !seen_root => {
                if local_name(&element) != b"kml" {
                    return Err(FormatError::corrupt(format, "document has no kml element"));
                }
                seen_root = true;
            }
            Event::Text(text) => {
                let value = events.text(&text)?;
                let parent = stack.len().checked_sub(2).and_then(|at| stack.get(at));
                match (parent.map(Vec::as_slice), stack.last().map(Vec::as_slice)) {
                    (Some(b"Placemark"), Some(b"name")) => {
                        if let Some(current) = placemark.as_mut() {
                            current.name = Some(value);
                        }
                    }
                    (Some(b"LineString"), Some(b"coordinates")) => {
                        if let Some(current) = placemark.as_mut() {
                            let points = line_coordinates(format, &value)?;
                            if !points.is_empty() {
                                current.lines.push(points);
                            }
                        }
                    }
                    (Some(b"Track"), Some(b"coord")) => {
                        if let Some(points) = gx_track.as_mut() {
                            points.push(track_coordinate(format, &value)?);
                        }
                    }
                    (_, Some(b"when")) => {
                        if document.date.is_none() {
                            document.date = parse_timestamp(&value);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(_) => match stack.pop().as_deref() {
                Some(b"Track") => {
                    if let (Some(points), Some(current)) = (gx_track.take(), placemark.as_mut()) {
                        if !points.is_empty() {
                            current.lines.push(points);
                        }
                    }
                }
                Some(b"Placemark") => {
                    if let Some(finished) = placemark.take() {
                        let name = finished
                            .name
                            .filter(|name| !name.is_empty())
                            .unwrap_or_else(|| UNNAMED.to_owned());
                        document
                            .lines
                            .extend(finished.lines.into_iter().map(|points| TrackLine {
                                name: name.clone(),
                                description: None,
                                points,
                            }));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(FormatError::corrupt(format, "document has no kml element"));
    }
    if !stack.is_empty() {
        return Err(FormatError::corrupt(format, "document ends inside an open element"));
    }
    Ok(document)
}

/// `lon,lat[,alt]` tuples separated by whitespace.
fn line_coordinates(format: &'static str, text: &str) -> Result<Vec<TrackPoint>, FormatError> {
    text.split_whitespace()
        .map(|tuple| sample(format, tuple, tuple.split(',')))
        .collect()
}

/// A single `gx:coord` value: `lon lat [alt]`.
fn track_coordinate(format: &'static str, text: &str) -> Result<TrackPoint, FormatError> {
    sample(format, text, text.split_whitespace())
}

fn sample<'a>(
    format: &'static str,
    raw: &str,
    parts: impl Iterator<Item = &'a str>,
) -> Result<TrackPoint, FormatError> {
    let invalid = || FormatError::corrupt(format, format!("invalid coordinate `{raw}`"));
    let values = parts
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [longitude, latitude] if in_range(*longitude, *latitude) => {
            Ok(TrackPoint::new(*longitude, *latitude))
        }
        [longitude, latitude, altitude] if in_range(*longitude, *latitude) => {
            Ok(TrackPoint::new(*longitude, *latitude).with_elevation(*altitude))
        }
        _ => Err(invalid()),
    }
}

fn in_range(longitude: f64, latitude: f64) -> bool {
    longitude.abs() <= 180.0 && latitude.abs() <= 90.0
}
