//! Categories and content kinds.

use std::collections::BTreeSet;
use std::fmt;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::placement::PlacementPolicy;

/// Broad family of content a category stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Recorded routes: GPX, KML and friends.
    Track,
    /// Photos and videos.
    Media,
}

impl ContentKind {
    /// Lower-case name used in configuration files and GeoJSON properties.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named bucket of files sharing a placement policy and accepted extensions.
///
/// Instances are only produced by [`Registry`](crate::Registry), which
/// guarantees that no two categories accept the same extension.
#[derive(Debug, Clone)]
pub struct Category {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) kind: ContentKind,
    pub(crate) extensions: BTreeSet<String>,
    pub(crate) policy: PlacementPolicy,
    pub(crate) color: Option<String>,
}

impl Category {
    /// Unique identifier; also the first directory of every managed path.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Content kind of the files stored here.
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Accepted extensions, lower case with a leading dot.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Placement policy for new and relocated files.
    #[must_use]
    pub const fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    /// Optional display colour.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Whether `extension` (any case, leading dot optional) belongs here.
    #[must_use]
    pub fn accepts(&self, extension: &str) -> bool {
        normalise_extension(extension).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Serialisable public view.
    #[must_use]
    pub fn view(&self) -> CategoryView {
        CategoryView {
            id: self.id.clone(),
            label: self.label.clone(),
            kind: self.kind,
            extensions: self.extensions.iter().cloned().collect(),
            policy: self.policy.name(),
            color: self.color.clone(),
        }
    }
}

/// Public description of a category, as exposed to UI clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    /// Category identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Content kind.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Accepted extensions.
    pub extensions: Vec<String>,
    /// Configured placement policy name.
    pub policy: &'static str,
    /// Display colour, when configured.
    pub color: Option<String>,
}

/// Normalise an extension to lower case with a single leading dot.
///
/// Returns `None` for empty input, nested extensions (`.tar.gz`) and
/// anything containing a path separator.
#[must_use]
pub fn normalise_extension(raw: &str) -> Option<String> {
    let bare = raw.trim().strip_prefix('.').unwrap_or_else(|| raw.trim());
    let valid = !bare.is_empty()
        && !bare.contains(['.', '/', '\\'])
        && !bare.chars().any(char::is_whitespace);
    valid.then(|| format!(".{}", bare.to_lowercase()))
}

/// Extension of `file_name`, normalised by [`normalise_extension`].
#[must_use]
pub fn extension_of(file_name: &str) -> Option<String> {
    Utf8Path::new(file_name)
        .extension()
        .and_then(normalise_extension)
}
