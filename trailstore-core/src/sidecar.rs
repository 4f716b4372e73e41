//! Side-channel JSON metadata kept beside each managed file.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp::parse_timestamp;

/// Suffix appended to a managed file's name to form its sidecar name.
pub const SIDECAR_SUFFIX: &str = ".json";
/// Manual latitude override, in decimal degrees.
pub const LATITUDE_KEY: &str = "latitude";
/// Manual longitude override, in decimal degrees.
pub const LONGITUDE_KEY: &str = "longitude";
/// Manual primary date override.
pub const DATE_KEY: &str = "date";

/// Location of the sidecar for the managed file at `path`.
#[must_use]
pub fn sidecar_path(path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{path}{SIDECAR_SUFFIX}"))
}

/// Metadata object persisted beside a managed file.
///
/// Keys the engine does not understand are kept untouched, so a sidecar
/// survives a read-modify-write cycle byte-for-byte apart from the keys
/// being updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sidecar(Map<String, Value>);

impl Sidecar {
    /// Decode a sidecar document, which must be a JSON object.
    ///
    /// # Errors
    /// Returns the decoder error for malformed JSON or non-object documents.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns the encoder error; a map of JSON values always encodes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.0)
    }

    /// Whether the sidecar carries no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All stored entries.
    #[must_use]
    pub const fn entries(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Manual coordinate override as `(latitude, longitude)`.
    ///
    /// Both keys must be present, numeric and within range.
    #[must_use]
    pub fn location(&self) -> Option<(f64, f64)> {
        let latitude = self.get(LATITUDE_KEY).and_then(Value::as_f64)?;
        let longitude = self.get(LONGITUDE_KEY).and_then(Value::as_f64)?;
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some((latitude, longitude))
    }

    /// Manual date override, when present and parseable.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.get(DATE_KEY)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }

    /// Apply `update`, returning the merged sidecar.
    #[must_use]
    pub fn merged(mut self, update: &SidecarUpdate) -> Self {
        for (key, value) in &update.0 {
            if value.is_null() {
                self.0.remove(key);
            } else {
                self.0.insert(key.clone(), value.clone());
            }
        }
        self
    }
}

/// Partial change to a sidecar. A `null` value removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SidecarUpdate(Map<String, Value>);

impl SidecarUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the manual coordinate override.
    #[must_use]
    pub fn location(self, latitude: f64, longitude: f64) -> Self {
        self.set(LATITUDE_KEY, latitude).set(LONGITUDE_KEY, longitude)
    }

    /// Set the manual date override, stored as RFC 3339.
    #[must_use]
    pub fn capture_date(self, date: DateTime<Utc>) -> Self {
        self.set(DATE_KEY, date.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Set an arbitrary key.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Remove a key when the update is applied.
    #[must_use]
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into(), Value::Null);
        self
    }

    /// Whether applying the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Date the update sets, if any.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(DATE_KEY)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}
