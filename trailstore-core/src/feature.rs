//! Geographic representation derived from a managed file.

use chrono::{DateTime, SecondsFormat, Utc};
use geo::Coord;
use serde_json::{Map, Value, json};

use crate::category::ContentKind;
use crate::sidecar::Sidecar;

/// A single recorded sample. `coord.x` is longitude and `coord.y` latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// Position in decimal degrees.
    pub coord: Coord<f64>,
    /// Elevation in metres, when recorded.
    pub elevation: Option<f64>,
    /// Sample time, when recorded.
    pub time: Option<DateTime<Utc>>,
}

impl TrackPoint {
    /// A sample without elevation or time.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            coord: Coord {
                x: longitude,
                y: latitude,
            },
            elevation: None,
            time: None,
        }
    }

    /// The same sample with an elevation.
    #[must_use]
    pub const fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    fn position(&self) -> Value {
        match self.elevation {
            Some(elevation) => json!([self.coord.x, self.coord.y, elevation]),
            None => json!([self.coord.x, self.coord.y]),
        }
    }
}

/// An ordered run of samples, such as a GPX segment or a KML line.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLine {
    /// Name shown on the map.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Samples in recording order.
    pub points: Vec<TrackPoint>,
}

/// Geometry carried by a [`GeographicFeature`].
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// One or more recorded lines.
    Lines(Vec<TrackLine>),
    /// A single position, as for geotagged media.
    Point(Coord<f64>),
    /// Pre-built GeoJSON features passed through unchanged.
    Features(Vec<Value>),
    /// Nothing to draw.
    Empty,
}

/// Map-ready representation of a managed file.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicFeature {
    /// Display name, usually the file name or the track name.
    pub name: String,
    /// Content kind of the source file.
    pub kind: ContentKind,
    /// Name of the format handler that produced the feature.
    pub format: &'static str,
    /// Primary date.
    pub date: Option<DateTime<Utc>>,
    /// Geometry to draw.
    pub geometry: Geometry,
    /// Category of the managed file, once known.
    pub category: Option<String>,
}

impl GeographicFeature {
    /// Merge manual overrides from `sidecar`.
    ///
    /// For media the sidecar location and date replace embedded metadata.
    /// Tracks keep their recorded geometry and only take the sidecar date
    /// when the file carries none.
    pub fn apply_overrides(&mut self, sidecar: &Sidecar) {
        match self.kind {
            ContentKind::Media => {
                if let Some((latitude, longitude)) = sidecar.location() {
                    self.geometry = Geometry::Point(Coord {
                        x: longitude,
                        y: latitude,
                    });
                }
                if let Some(date) = sidecar.date() {
                    self.date = Some(date);
                }
            }
            ContentKind::Track => {
                if self.date.is_none() {
                    self.date = sidecar.date();
                }
            }
        }
    }

    /// Every sample of every line, in order.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        let lines: &[TrackLine] = match &self.geometry {
            Geometry::Lines(lines) => lines,
            _ => &[],
        };
        lines.iter().flat_map(|line| line.points.iter())
    }

    /// Render as a GeoJSON `FeatureCollection`.
    ///
    /// Coordinates are `[longitude, latitude]`, with elevation appended when
    /// recorded. Every feature carries `name`, `type`, `format`, `date` and
    /// `category` properties; pass-through features keep any property they
    /// already define.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = match &self.geometry {
            Geometry::Lines(lines) => lines
                .iter()
                .map(|line| {
                    let mut properties = self.properties(&line.name);
                    if let Some(description) = &line.description {
                        properties.insert("description".to_owned(), json!(description));
                    }
                    let coordinates: Vec<Value> =
                        line.points.iter().map(TrackPoint::position).collect();
                    feature(
                        json!({"type": "LineString", "coordinates": coordinates}),
                        properties,
                    )
                })
                .collect(),
            Geometry::Point(coord) => vec![feature(
                json!({"type": "Point", "coordinates": [coord.x, coord.y]}),
                self.properties(&self.name),
            )],
            Geometry::Features(features) => features
                .iter()
                .cloned()
                .map(|mut value| {
                    self.annotate(&mut value);
                    value
                })
                .collect(),
            Geometry::Empty => Vec::new(),
        };
        json!({"type": "FeatureCollection", "features": features})
    }

    fn properties(&self, name: &str) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert("name".to_owned(), json!(name));
        properties.insert("type".to_owned(), json!(self.kind.as_str()));
        properties.insert("format".to_owned(), json!(self.format));
        properties.insert(
            "date".to_owned(),
            self.date
                .map_or(Value::Null, |date| json!(date.to_rfc3339_opts(SecondsFormat::Secs, true))),
        );
        properties.insert("category".to_owned(), json!(self.category));
        properties
    }

    fn annotate(&self, value: &mut Value) {
        let Some(object) = value.as_object_mut() else {
            return;
        };
        let existing = match object.remove("properties") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let mut properties = self.properties(&self.name);
        properties.extend(existing);
        object.insert("properties".to_owned(), Value::Object(properties));
    }
}

fn feature(geometry: Value, properties: Map<String, Value>) -> Value {
    json!({"type": "Feature", "geometry": geometry, "properties": properties})
}
