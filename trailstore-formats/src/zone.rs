//! Static GeoJSON zones.

use serde_json::{Map, Value, json};
use trailstore_core::{ContentKind, Geometry};

use crate::{FormatError, FormatHandler, Parsed, Source};

const FORMAT: &str = "zone";

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Handler for `.geojson` zone definitions. Zones carry no date.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonZone;

impl FormatHandler for GeoJsonZone {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Track
    }

    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError> {
        let document: Value = serde_json::from_slice(source.bytes)
            .map_err(|source| FormatError::Json { format: FORMAT, source })?;
        let features = features_of(document)?;
        Ok(Parsed {
            date: None,
            geometry: Geometry::Features(features),
        })
    }
}

fn features_of(document: Value) -> Result<Vec<Value>, FormatError> {
    let kind = document
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FormatError::corrupt(FORMAT, "document has no GeoJSON type"))?;
    match kind {
        "FeatureCollection" => match document.get("features") {
            Some(Value::Array(features)) => Ok(features.clone()),
            _ => Err(FormatError::corrupt(FORMAT, "feature collection without features")),
        },
        "Feature" => Ok(vec![document]),
        geometry if GEOMETRY_TYPES.contains(&geometry) => Ok(vec![json!({
            "type": "Feature",
            "geometry": document,
            "properties": Map::new(),
        })]),
        other => Err(FormatError::corrupt(
            FORMAT,
            format!("unsupported GeoJSON type `{other}`"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(content: &Value) -> Result<Parsed, FormatError> {
        let bytes = serde_json::to_vec(content).expect("encode");
        GeoJsonZone.parse(&Source::new("park.geojson", &bytes))
    }

    #[rstest]
    #[case::collection(json!({"type": "FeatureCollection", "features": [
        {"type": "Feature", "geometry": null, "properties": {}},
        {"type": "Feature", "geometry": null, "properties": {}}
    ]}), 2)]
    #[case::feature(json!({"type": "Feature", "geometry": null, "properties": {}}), 1)]
    #[case::bare_geometry(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}), 1)]
    fn zones_pass_through(#[case] content: Value, #[case] expected: usize) {
        let parsed = parse(&content).expect("parse");
        let Geometry::Features(features) = &parsed.geometry else {
            panic!("expected features");
        };
        assert_eq!(features.len(), expected);
        assert_eq!(parsed.date, None);
    }

    #[rstest]
    #[case(json!([1, 2]))]
    #[case(json!({"type": "Circle"}))]
    #[case(json!({"type": "FeatureCollection"}))]
    fn non_geojson_is_rejected(#[case] content: Value) {
        assert!(parse(&content).is_err());
    }

    #[rstest]
    fn invalid_json_is_rejected() {
        let err = GeoJsonZone
            .parse(&Source::new("park.geojson", b"{"))
            .expect_err("truncated");
        assert!(matches!(err, FormatError::Json { .. }));
    }
}
