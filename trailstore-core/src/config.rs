//! Serde model of the repository's `storage.toml`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::ContentKind;

/// Policy routing file read by `ConfigurablePolicy` when none is named.
pub const DEFAULT_POLICY_FILE: &str = "storage.toml";

/// Top-level repository configuration.
///
/// Unknown top-level tables (such as the `[policies]` routing table that may
/// share the same file) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Categories keyed by identifier.
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryConfig>,
}

/// A single `[categories.<id>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Display label; defaults to the identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Content kind. Required; kept optional here so a missing value is
    /// reported as a validation error naming the category.
    #[serde(rename = "type", default)]
    pub kind: Option<ContentKind>,
    /// Accepted extensions, each beginning with `.`.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Placement policy.
    #[serde(default)]
    pub storage_policy: PolicyConfig,
    /// Optional display colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// The `storage_policy` table of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum PolicyConfig {
    /// `<category>/<year>/<month>/<file>`.
    #[default]
    #[serde(rename = "DateBasedPolicy")]
    DateBased,
    /// `<category>/<file>`.
    #[serde(rename = "FlatPolicy")]
    Flat,
    /// Per-category routing read from a policy file.
    #[serde(rename = "ConfigurablePolicy")]
    Configurable {
        /// Routing file, relative to the repository root.
        #[serde(default = "default_policy_file")]
        config_file: String,
    },
}

fn default_policy_file() -> String {
    DEFAULT_POLICY_FILE.to_owned()
}

impl RepositoryConfig {
    /// Decode a configuration document.
    ///
    /// # Errors
    /// Returns the TOML decoder error when the document is malformed or a
    /// field carries an unexpected value.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Layout used when a repository has no configuration file.
    #[must_use]
    pub fn default_layout() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            "tracks".to_owned(),
            CategoryConfig {
                name: Some("tracks".to_owned()),
                kind: Some(ContentKind::Track),
                extensions: [".gpx", ".fit", ".kml", ".kmz", ".geojson"]
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
                storage_policy: PolicyConfig::DateBased,
                color: None,
            },
        );
        categories.insert(
            "media".to_owned(),
            CategoryConfig {
                name: Some("media".to_owned()),
                kind: Some(ContentKind::Media),
                extensions: [
                    ".jpg", ".jpeg", ".png", ".tif", ".tiff", ".webp", ".heic", ".mp4", ".mov",
                    ".avi", ".mkv", ".webm",
                ]
                .into_iter()
                .map(str::to_owned)
                .collect(),
                storage_policy: PolicyConfig::DateBased,
                color: None,
            },
        );
        Self { categories }
    }
}
