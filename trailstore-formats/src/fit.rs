//! Garmin FIT activity files.

use chrono::{DateTime, Utc};
use fitparser::profile::MesgNum;
use fitparser::{FitDataField, FitDataRecord, Value};
use log::debug;
use trailstore_core::{ContentKind, Geometry, TrackLine, TrackPoint};

use crate::filename_date::date_from_file_name;
use crate::{FormatError, FormatHandler, Parsed, Source};

const FORMAT: &str = "fit";
const UNNAMED: &str = "FIT Track";
/// 180 / 2^31.
const DEGREES_PER_SEMICIRCLE: f64 = 180.0 / 2_147_483_648.0;

/// Handler for `.fit` files.
///
/// Positioned `record` messages form one line named after the file stem.
/// The primary date is the `file_id` creation time, else the first record
/// timestamp, else the session start, else the activity timestamp, else a
/// date stamp in the file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fit;

impl FormatHandler for Fit {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Track
    }

    fn parse(&self, source: &Source<'_>) -> Result<Parsed, FormatError> {
        let records = fitparser::from_bytes(source.bytes)
            .map_err(|err| FormatError::corrupt(FORMAT, err.to_string()))?;
        let points: Vec<TrackPoint> = records
            .iter()
            .filter(|record| matches!(record.kind(), MesgNum::Record))
            .filter_map(track_point)
            .collect();
        let date = recording_date(&records).or_else(|| date_from_file_name(source.file_name));
        if date.is_none() {
            debug!("{} carries no recording date", source.file_name);
        }
        let geometry = if points.is_empty() {
            Geometry::Empty
        } else {
            Geometry::Lines(vec![TrackLine {
                name: line_name(source.file_name),
                description: None,
                points,
            }])
        };
        Ok(Parsed { date, geometry })
    }
}

fn recording_date(records: &[FitDataRecord]) -> Option<DateTime<Utc>> {
    first_time(
        records,
        |record| matches!(record.kind(), MesgNum::FileId),
        &["time_created"],
    )
    .or_else(|| {
        first_time(
            records,
            |record| matches!(record.kind(), MesgNum::Record),
            &["timestamp"],
        )
    })
    .or_else(|| {
        first_time(
            records,
            |record| matches!(record.kind(), MesgNum::Session),
            &["start_time", "timestamp"],
        )
    })
    .or_else(|| {
        first_time(
            records,
            |record| matches!(record.kind(), MesgNum::Activity),
            &["timestamp", "local_timestamp"],
        )
    })
}

/// First time found in any of `names` on a message accepted by `wanted`.
fn first_time(
    records: &[FitDataRecord],
    wanted: fn(&FitDataRecord) -> bool,
    names: &[&str],
) -> Option<DateTime<Utc>> {
    records
        .iter()
        .filter(|record| wanted(record))
        .find_map(|record| names.iter().find_map(|name| time(field(record, name)?)))
}

fn track_point(record: &FitDataRecord) -> Option<TrackPoint> {
    let latitude = number(field(record, "position_lat")?)? * DEGREES_PER_SEMICIRCLE;
    let longitude = number(field(record, "position_long")?)? * DEGREES_PER_SEMICIRCLE;
    let mut point = TrackPoint::new(longitude, latitude);
    point.elevation = field(record, "enhanced_altitude")
        .or_else(|| field(record, "altitude"))
        .and_then(number);
    point.time = field(record, "timestamp").and_then(time);
    Some(point)
}

fn field<'a>(record: &'a FitDataRecord, name: &str) -> Option<&'a Value> {
    record
        .fields()
        .iter()
        .find(|candidate| candidate.name() == name)
        .map(FitDataField::value)
}

fn time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(at) => Some(at.with_timezone(&Utc)),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::SInt32(raw) => Some(f64::from(*raw)),
        Value::UInt32(raw) => Some(f64::from(*raw)),
        Value::SInt16(raw) => Some(f64::from(*raw)),
        Value::UInt16(raw) => Some(f64::from(*raw)),
        Value::UInt8(raw) => Some(f64::from(*raw)),
        Value::Float32(raw) => Some(f64::from(*raw)),
        Value::Float64(raw) => Some(*raw),
        _ => None,
    }
}

fn line_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_owned(),
        _ => UNNAMED.to_owned(),
    }
}
