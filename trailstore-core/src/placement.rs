//! Placement policies and the decisions they produce.
//!
//! A policy maps a category and a file's primary date to a directory inside
//! the repository. Collision handling is shared by every policy: the engine
//! asks [`resolve_collision`] for the first free variant of a decision.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::ContentKind;

/// Inputs a policy may consult when placing a file.
#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    /// Target category identifier.
    pub category: &'a str,
    /// Content kind of the target category.
    pub kind: ContentKind,
    /// Final file name, extension included.
    pub file_name: &'a str,
    /// Primary date reported by the format handler or the sidecar.
    pub date: Option<DateTime<Utc>>,
    /// Time the engine received the file; used when `date` is absent.
    pub received_at: DateTime<Utc>,
}

impl PlacementRequest<'_> {
    /// The primary date, or the ingest time when the file carries none.
    #[must_use]
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.date.unwrap_or(self.received_at)
    }
}

/// Error raised when a policy cannot produce a usable decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The file name is empty or is not a single path segment.
    #[error("`{name}` is not a valid file name")]
    InvalidFileName {
        /// Rejected name.
        name: String,
    },
    /// A directory escapes the category folder or contains special segments.
    #[error("directory `{directory}` is not a plain relative path inside category `{category}`")]
    InvalidDirectory {
        /// Category the directory was computed for.
        category: String,
        /// Rejected directory.
        directory: Utf8PathBuf,
    },
}

/// Caller-supplied directory template for [`ConfigurablePolicy::Template`].
///
/// The function returns a directory relative to the category folder; an
/// empty path places files directly inside the category.
#[derive(Clone)]
pub struct PlacementTemplate(Arc<dyn Fn(&PlacementRequest<'_>) -> Utf8PathBuf + Send + Sync>);

impl PlacementTemplate {
    /// Wrap a template function.
    pub fn new<F>(template: F) -> Self
    where
        F: Fn(&PlacementRequest<'_>) -> Utf8PathBuf + Send + Sync + 'static,
    {
        Self(Arc::new(template))
    }

    fn directory(&self, request: &PlacementRequest<'_>) -> Utf8PathBuf {
        (self.0)(request)
    }
}

impl fmt::Debug for PlacementTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlacementTemplate").finish_non_exhaustive()
    }
}

/// Layout a routing table assigns to a category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutedPolicy {
    /// Year and month folders.
    #[default]
    DateBased,
    /// Directly inside the category folder.
    Flat,
}

/// Per-category routing read from the `[policies]` table of a policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: BTreeMap<String, RoutedPolicy>,
}

#[derive(Deserialize)]
struct PolicyFile {
    #[serde(default)]
    policies: BTreeMap<String, RoutedPolicy>,
}

impl RoutingTable {
    /// Decode the `[policies]` table of a policy file. Other tables are
    /// ignored so the routing may live in `storage.toml` itself.
    ///
    /// # Errors
    /// Returns the TOML decoder error for malformed documents or unknown
    /// policy names.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let file: PolicyFile = toml::from_str(text)?;
        Ok(Self {
            routes: file.policies,
        })
    }

    /// Add or replace the route for `category`.
    #[must_use]
    pub fn with_route(mut self, category: impl Into<String>, policy: RoutedPolicy) -> Self {
        self.routes.insert(category.into(), policy);
        self
    }

    /// Layout for `category`; unnamed categories are date-based.
    #[must_use]
    pub fn policy_for(&self, category: &str) -> RoutedPolicy {
        self.routes.get(category).copied().unwrap_or_default()
    }
}

/// Placement driven by configuration rather than a fixed layout.
#[derive(Debug, Clone)]
pub enum ConfigurablePolicy {
    /// Route each category to a built-in layout.
    Routed(RoutingTable),
    /// Compute the directory with a caller-supplied function.
    Template(PlacementTemplate),
}

impl ConfigurablePolicy {
    fn directory(&self, request: &PlacementRequest<'_>) -> Utf8PathBuf {
        match self {
            Self::Routed(table) => match table.policy_for(request.category) {
                RoutedPolicy::DateBased => date_directory(request),
                RoutedPolicy::Flat => Utf8PathBuf::new(),
            },
            Self::Template(template) => template.directory(request),
        }
    }
}

/// Strategy deciding where a category's files live.
#[derive(Debug, Clone)]
pub enum PlacementPolicy {
    /// `<category>/<year>/<month>/<file>`.
    DateBased,
    /// `<category>/<file>`.
    Flat,
    /// Routed or templated placement.
    Configurable(ConfigurablePolicy),
}

impl PlacementPolicy {
    /// Name used in configuration files.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DateBased => "DateBasedPolicy",
            Self::Flat => "FlatPolicy",
            Self::Configurable(_) => "ConfigurablePolicy",
        }
    }

    /// Compute the destination for `request`, before collision handling.
    ///
    /// # Errors
    /// Returns [`PlacementError`] when the file name is not a single path
    /// segment or a template produces an unusable directory.
    pub fn decide(&self, request: &PlacementRequest<'_>) -> Result<PlacementDecision, PlacementError> {
        let directory = match self {
            Self::DateBased => date_directory(request),
            Self::Flat => Utf8PathBuf::new(),
            Self::Configurable(policy) => policy.directory(request),
        };
        PlacementDecision::new(request.category, directory, request.file_name)
    }
}

fn date_directory(request: &PlacementRequest<'_>) -> Utf8PathBuf {
    let date = request.effective_date();
    Utf8PathBuf::from(format!("{:04}/{:02}", date.year(), date.month()))
}

/// Where a file should live: category folder, directory within it, file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementDecision {
    category: String,
    directory: Utf8PathBuf,
    file_name: String,
}

impl PlacementDecision {
    /// Build a decision from its parts.
    ///
    /// # Errors
    /// Returns [`PlacementError`] when `file_name` is not a single segment
    /// or `directory` contains anything other than plain names.
    pub fn new(
        category: &str,
        directory: Utf8PathBuf,
        file_name: &str,
    ) -> Result<Self, PlacementError> {
        if !is_plain_segment(file_name) {
            return Err(PlacementError::InvalidFileName {
                name: file_name.to_owned(),
            });
        }
        let plain = directory
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(name) if is_plain_segment(name)));
        if !plain {
            return Err(PlacementError::InvalidDirectory {
                category: category.to_owned(),
                directory,
            });
        }
        Ok(Self {
            category: category.to_owned(),
            directory,
            file_name: file_name.to_owned(),
        })
    }

    /// Category identifier.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Directory relative to the category folder.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Final file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory relative to the repository root.
    #[must_use]
    pub fn parent(&self) -> Utf8PathBuf {
        if self.directory.as_str().is_empty() {
            Utf8PathBuf::from(&self.category)
        } else {
            Utf8Path::new(&self.category).join(&self.directory)
        }
    }

    /// Full path relative to the repository root.
    #[must_use]
    pub fn relative_path(&self) -> Utf8PathBuf {
        self.parent().join(&self.file_name)
    }

    /// The same decision with the `attempt`-th collision suffix applied.
    #[must_use]
    pub fn disambiguated(&self, attempt: u32) -> Self {
        Self {
            category: self.category.clone(),
            directory: self.directory.clone(),
            file_name: disambiguated_name(&self.file_name, attempt),
        }
    }
}

/// A non-empty, visible name without separators. Hidden segments are
/// refused because listings skip them.
fn is_plain_segment(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

/// `name (n).ext` for `attempt` `n`; the name itself for attempt zero.
#[must_use]
pub fn disambiguated_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_owned();
    }
    let path = Utf8Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(extension)) => format!("{stem} ({attempt}).{extension}"),
        _ => format!("{file_name} ({attempt})"),
    }
}

/// First variant of `decision` for which `is_taken` reports `false`.
///
/// Variants are probed in order: the decision itself, then `(1)`, `(2)`, and
/// so on. Returns `Ok(None)` only when every suffix is taken.
///
/// # Errors
/// Propagates the first error returned by `is_taken`.
pub fn resolve_collision<E, F>(
    decision: &PlacementDecision,
    mut is_taken: F,
) -> Result<Option<PlacementDecision>, E>
where
    F: FnMut(&Utf8Path) -> Result<bool, E>,
{
    for attempt in 0..=u32::MAX {
        let candidate = decision.disambiguated(attempt);
        if !is_taken(&candidate.relative_path())? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}
