//! GPX 1.0/1.1 track files.

use chrono::{DateTime, Utc};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use trailstore_core::{ContentKind, Geometry, TrackLine, TrackPoint, parse_timestamp};

use crate::filename_date::date_from_file_name;
use crate::xml::{XmlEvents, local_name};
use crate::{FormatError, FormatHandler, Parsed, Source};

const FORMAT: &str = "gpx";
const UNNAMED: &str = "Unnamed Track";

/// Handler for `.gpx` files.
///
/// Each track segment becomes one line named after its track. The primary
/// date is the metadata time, else the first point time, else a date stamp
/// in the file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gpx;

impl FormatHandler for Gpx {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Track
    }

    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError> {
        let document = GpxDocument::read(source.bytes)?;
        let first_point_time = document
            .lines
            .iter()
            .flat_map(|line| line.points.iter())
            .find_map(|point| point.time);
        let date = document
            .metadata_time
            .or(first_point_time)
            .or_else(|| date_from_file_name(source.file_name));
        if date.is_none() {
            debug!("{} carries no recording date", source.file_name);
        }
        Ok(Parsed {
            date,
            geometry: Geometry::Lines(document.lines),
        })
    }
}

#[derive(Default)]
struct TrackState {
    name: Option<String>,
    description: Option<String>,
    segments: Vec<Vec<TrackPoint>>,
}

#[derive(Default)]
struct GpxDocument {
    metadata_time: Option<DateTime<Utc>>,
    lines: Vec<TrackLine>,
}

impl GpxDocument {
    fn read(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut events = XmlEvents::new(FORMAT, bytes);
        let mut document = Self::default();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut track: Option<TrackState> = None;
        let mut segment: Option<Vec<TrackPoint>> = None;
        let mut point: Option<TrackPoint> = None;
        let mut seen_root = false;

        loop {
            match events.next()? {
                Event::Start(element) => {
                    let name = local_name(&element);
                    check_root(&mut seen_root, &name)?;
                    match name.as_slice() {
                        b"trk" => track = Some(TrackState::default()),
                        b"trkseg" => segment = Some(Vec::new()),
                        b"trkpt" => point = Some(read_point(&events, &element)?),
                        _ => {}
                    }
                    stack.push(name);
                }
                Event::Empty(element) => {
                    let name = local_name(&element);
                    check_root(&mut seen_root, &name)?;
                    if name == b"trkpt" {
                        let sample = read_point(&events, &element)?;
                        if let Some(points) = segment.as_mut() {
                            points.push(sample);
                        }
                    }
                }
                Event::Text(text) => {
                    let value = events.text(&text)?;
                    apply_text(&stack, value, &mut document, track.as_mut(), point.as_mut())?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data).trim().to_owned();
                    apply_text(&stack, value, &mut document, track.as_mut(), point.as_mut())?;
                }
                Event::End(_) => match stack.pop().as_deref() {
                    Some(b"trkpt") => {
                        if let (Some(sample), Some(points)) = (point.take(), segment.as_mut()) {
                            points.push(sample);
                        }
                    }
                    Some(b"trkseg") => {
                        if let (Some(points), Some(state)) = (segment.take(), track.as_mut()) {
                            state.segments.push(points);
                        }
                    }
                    Some(b"trk") => {
                        if let Some(state) = track.take() {
                            document.finish_track(state);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(FormatError::corrupt(FORMAT, "document has no gpx element"));
        }
        if !stack.is_empty() {
            return Err(FormatError::corrupt(FORMAT, "document ends inside an open element"));
        }
        Ok(document)
    }

    fn finish_track(&mut self, state: TrackState) {
        let name = state
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNNAMED.to_owned());
        for points in state.segments.into_iter().filter(|points| !points.is_empty()) {
            self.lines.push(TrackLine {
                name: name.clone(),
                description: state.description.clone(),
                points,
            });
        }
    }
}

fn check_root(seen_root: &mut bool, name: &[u8]) -> Result<(), FormatError> {
    if *seen_root {
        return Ok(());
    }
    if name != b"gpx" {
        return Err(FormatError::corrupt(
            FORMAT,
            format!("root element is <{}>", String::from_utf8_lossy(name)),
        ));
    }
    *seen_root = true;
    Ok(())
}

fn read_point(events: &XmlEvents<'_>, element: &BytesStart<'_>) -> Result<TrackPoint, FormatError> {
    let latitude = coordinate(events, element, b"lat", 90.0)?;
    let longitude = coordinate(events, element, b"lon", 180.0)?;
    Ok(TrackPoint::new(longitude, latitude))
}

fn coordinate(
    events: &XmlEvents<'_>,
    element: &BytesStart<'_>,
    key: &[u8],
    limit: f64,
) -> Result<f64, FormatError> {
    let label = String::from_utf8_lossy(key);
    let raw = events
        .attribute(element, key)?
        .ok_or_else(|| FormatError::corrupt(FORMAT, format!("trkpt without {label}")))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.abs() <= limit)
        .ok_or_else(|| FormatError::corrupt(FORMAT, format!("invalid {label} `{raw}`")))
}

fn apply_text(
    stack: &[Vec<u8>],
    value: String,
    document: &mut GpxDocument,
    track: Option<&mut TrackState>,
    point: Option<&mut TrackPoint>,
) -> Result<(), FormatError> {
    let (Some(element), parent) = (stack.last(), stack.len().checked_sub(2).and_then(|at| stack.get(at)))
    else {
        return Ok(());
    };
    match (parent.map(Vec::as_slice), element.as_slice()) {
        (Some(b"metadata" | b"gpx"), b"time") => {
            if document.metadata_time.is_none() {
                document.metadata_time = parse_timestamp(&value);
            }
        }
        (Some(b"trk"), b"name") => {
            if let Some(state) = track {
                state.name = Some(value);
            }
        }
        (Some(b"trk"), b"desc") => {
            if let Some(state) = track {
                state.description = Some(value);
            }
        }
        (Some(b"trkpt"), b"ele") => {
            if let Some(sample) = point {
                let elevation = value.parse::<f64>().map_err(|_| {
                    FormatError::corrupt(FORMAT, format!("invalid elevation `{value}`"))
                })?;
                sample.elevation = Some(elevation);
            }
        }
        (Some(b"trkpt"), b"time") => {
            if let Some(sample) = point {
                sample.time = parse_timestamp(&value);
            }
        }
        _ => {}
    }
    Ok(())
}
