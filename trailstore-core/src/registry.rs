//! The validated category registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;

use log::debug;
use thiserror::Error;

use crate::category::{Category, CategoryView, normalise_extension};
use crate::config::{CategoryConfig, PolicyConfig, RepositoryConfig};
use crate::placement::{ConfigurablePolicy, PlacementPolicy, PlacementTemplate, RoutingTable};
use crate::sidecar::SIDECAR_SUFFIX;

/// Error raised while building a [`Registry`] from configuration.
#[derive(Debug, Error)]
pub enum CategoryConfigError {
    /// The configuration document could not be decoded.
    #[error("failed to parse repository configuration: {source}")]
    Parse {
        /// Underlying TOML decoder error.
        #[source]
        source: toml::de::Error,
    },
    /// A category was declared with an empty identifier.
    #[error("category identifier must not be empty")]
    EmptyIdentifier,
    /// A category identifier cannot serve as a top-level directory name.
    #[error("category identifier `{id}` must be a single visible path segment")]
    InvalidIdentifier {
        /// Rejected identifier.
        id: String,
    },
    /// A category did not declare its content type.
    #[error("category `{id}` does not declare a type")]
    MissingKind {
        /// Offending category.
        id: String,
    },
    /// A category accepts no extensions.
    #[error("category `{id}` does not accept any extension")]
    NoExtensions {
        /// Offending category.
        id: String,
    },
    /// An extension is malformed or lacks its leading dot.
    #[error("category `{id}` lists invalid extension `{extension}`")]
    InvalidExtension {
        /// Offending category.
        id: String,
        /// Extension as written in the configuration.
        extension: String,
    },
    /// A category claims the suffix reserved for sidecar files.
    #[error("category `{id}` may not claim the sidecar suffix `{extension}`")]
    ReservedExtension {
        /// Offending category.
        id: String,
        /// The reserved extension.
        extension: String,
    },
    /// Two categories accept the same extension.
    #[error("extension `{extension}` is claimed by both `{first}` and `{second}`")]
    DuplicateExtension {
        /// Normalised extension.
        extension: String,
        /// Category that claimed it first.
        first: String,
        /// Category that claimed it again.
        second: String,
    },
    /// Reading a configurable policy's routing file failed.
    #[error("failed to read policy file {path}: {source}")]
    PolicyFile {
        /// Routing file named by the category.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A configurable policy's routing file could not be decoded.
    #[error("failed to parse policy file {path}: {source}")]
    PolicyFileParse {
        /// Routing file named by the category.
        path: String,
        /// Underlying TOML decoder error.
        #[source]
        source: toml::de::Error,
    },
    /// A category named by the caller does not exist.
    #[error("unknown category `{id}`")]
    UnknownCategory {
        /// Requested identifier.
        id: String,
    },
}

/// Error raised by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No category accepts the extension.
    #[error("no category accepts extension `{extension}`")]
    UnknownExtension {
        /// Extension as supplied by the caller.
        extension: String,
    },
    /// No category has the identifier.
    #[error("unknown category `{id}`")]
    UnknownCategory {
        /// Requested identifier.
        id: String,
    },
}

/// Immutable map from extensions to categories and categories to policies.
///
/// A registry is validated as a whole when it is built; a configuration
/// reload produces a fresh value rather than mutating an existing one.
#[derive(Debug, Clone)]
pub struct Registry {
    categories: BTreeMap<String, Category>,
    by_extension: HashMap<String, String>,
}

impl Registry {
    /// Validate `config` and build the registry.
    ///
    /// `read_policy_file` loads the routing file of any `ConfigurablePolicy`
    /// category, given the path as written in the configuration. Returning
    /// `Ok(None)` means the file does not exist, in which case every category
    /// routed through it is date-based.
    ///
    /// # Errors
    /// Returns the first [`CategoryConfigError`] found, visiting categories in
    /// identifier order.
    pub fn load<F>(config: &RepositoryConfig, mut read_policy_file: F) -> Result<Self, CategoryConfigError>
    where
        F: FnMut(&str) -> io::Result<Option<String>>,
    {
        let mut routing: HashMap<String, RoutingTable> = HashMap::new();
        let mut categories = BTreeMap::new();
        let mut by_extension: HashMap<String, String> = HashMap::new();

        for (id, entry) in &config.categories {
            validate_identifier(id)?;
            let kind = entry
                .kind
                .ok_or_else(|| CategoryConfigError::MissingKind { id: id.clone() })?;
            let extensions = validate_extensions(id, entry)?;
            for extension in &extensions {
                if let Some(first) = by_extension.get(extension) {
                    return Err(CategoryConfigError::DuplicateExtension {
                        extension: extension.clone(),
                        first: first.clone(),
                        second: id.clone(),
                    });
                }
                by_extension.insert(extension.clone(), id.clone());
            }
            let policy = match &entry.storage_policy {
                PolicyConfig::DateBased => PlacementPolicy::DateBased,
                PolicyConfig::Flat => PlacementPolicy::Flat,
                PolicyConfig::Configurable { config_file } => {
                    let table = routing_table(&mut routing, config_file, &mut read_policy_file)?;
                    PlacementPolicy::Configurable(ConfigurablePolicy::Routed(table))
                }
            };
            categories.insert(
                id.clone(),
                Category {
                    id: id.clone(),
                    label: entry.name.clone().unwrap_or_else(|| id.clone()),
                    kind,
                    extensions,
                    policy,
                    color: entry.color.clone(),
                },
            );
        }

        Ok(Self {
            categories,
            by_extension,
        })
    }

    /// Decode a `storage.toml` document and build the registry.
    ///
    /// # Errors
    /// Returns [`CategoryConfigError::Parse`] for malformed documents and any
    /// validation error raised by [`Registry::load`].
    pub fn from_toml<F>(text: &str, read_policy_file: F) -> Result<Self, CategoryConfigError>
    where
        F: FnMut(&str) -> io::Result<Option<String>>,
    {
        let config =
            RepositoryConfig::from_toml(text).map_err(|source| CategoryConfigError::Parse { source })?;
        Self::load(&config, read_policy_file)
    }

    /// Replace a category's policy with a caller-supplied template.
    ///
    /// # Errors
    /// Returns [`CategoryConfigError::UnknownCategory`] when `id` is not
    /// registered.
    pub fn with_template(
        mut self,
        id: &str,
        template: PlacementTemplate,
    ) -> Result<Self, CategoryConfigError> {
        let category = self
            .categories
            .get_mut(id)
            .ok_or_else(|| CategoryConfigError::UnknownCategory { id: id.to_owned() })?;
        category.policy = PlacementPolicy::Configurable(ConfigurablePolicy::Template(template));
        Ok(self)
    }

    /// Category with identifier `id`.
    ///
    /// # Errors
    /// Returns [`LookupError::UnknownCategory`] when `id` is not registered.
    pub fn category(&self, id: &str) -> Result<&Category, LookupError> {
        self.categories
            .get(id)
            .ok_or_else(|| LookupError::UnknownCategory { id: id.to_owned() })
    }

    /// Category accepting `extension`, in any case and with or without the
    /// leading dot.
    ///
    /// # Errors
    /// Returns [`LookupError::UnknownExtension`] when no category accepts it.
    pub fn resolve_category(&self, extension: &str) -> Result<&Category, LookupError> {
        normalise_extension(extension)
            .and_then(|ext| self.by_extension.get(&ext))
            .and_then(|id| self.categories.get(id))
            .ok_or_else(|| LookupError::UnknownExtension {
                extension: extension.to_owned(),
            })
    }

    /// Placement policy of `category`.
    #[must_use]
    pub fn resolve_policy<'a>(&'a self, category: &'a Category) -> &'a PlacementPolicy {
        self.categories
            .get(category.id())
            .map_or_else(|| category.policy(), Category::policy)
    }

    /// Whether some category accepts `extension`.
    #[must_use]
    pub fn is_managed_extension(&self, extension: &str) -> bool {
        normalise_extension(extension).is_some_and(|ext| self.by_extension.contains_key(&ext))
    }

    /// Registered categories in identifier order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Public views of every category, in identifier order.
    #[must_use]
    pub fn views(&self) -> Vec<CategoryView> {
        self.categories.values().map(Category::view).collect()
    }
}

fn validate_identifier(id: &str) -> Result<(), CategoryConfigError> {
    if id.trim().is_empty() {
        return Err(CategoryConfigError::EmptyIdentifier);
    }
    if id.starts_with('.') || id.contains(['/', '\\']) {
        return Err(CategoryConfigError::InvalidIdentifier { id: id.to_owned() });
    }
    Ok(())
}

fn validate_extensions(
    id: &str,
    entry: &CategoryConfig,
) -> Result<BTreeSet<String>, CategoryConfigError> {
    if entry.extensions.is_empty() {
        return Err(CategoryConfigError::NoExtensions { id: id.to_owned() });
    }
    let mut extensions = BTreeSet::new();
    for raw in &entry.extensions {
        let normalised = raw
            .trim()
            .starts_with('.')
            .then(|| normalise_extension(raw))
            .flatten()
            .ok_or_else(|| CategoryConfigError::InvalidExtension {
                id: id.to_owned(),
                extension: raw.clone(),
            })?;
        if normalised == SIDECAR_SUFFIX {
            return Err(CategoryConfigError::ReservedExtension {
                id: id.to_owned(),
                extension: normalised,
            });
        }
        extensions.insert(normalised);
    }
    Ok(extensions)
}

fn routing_table<F>(
    cache: &mut HashMap<String, RoutingTable>,
    path: &str,
    read_policy_file: &mut F,
) -> Result<RoutingTable, CategoryConfigError>
where
    F: FnMut(&str) -> io::Result<Option<String>>,
{
    if let Some(table) = cache.get(path) {
        return Ok(table.clone());
    }
    let text = read_policy_file(path).map_err(|source| CategoryConfigError::PolicyFile {
        path: path.to_owned(),
        source,
    })?;
    let table = match text {
        Some(text) => RoutingTable::from_toml(&text).map_err(|source| {
            CategoryConfigError::PolicyFileParse {
                path: path.to_owned(),
                source,
            }
        })?,
        None => {
            debug!("policy file {path} not found; routing every category by date");
            RoutingTable::default()
        }
    };
    cache.insert(path.to_owned(), table.clone());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ContentKind;
    use crate::placement::RoutedPolicy;
    use rstest::{fixture, rstest};

    const SCENARIO: &str = r##"
        [categories.trail]
        name = "Trail"
        type = "track"
        extensions = [".gpx", ".KML"]

        [categories.media]
        type = "media"
        extensions = [".jpg"]
        storage_policy = { name = "FlatPolicy" }
        color = "#3366ff"
    "##;

    fn no_policy_file(_: &str) -> io::Result<Option<String>> {
        Ok(None)
    }

    #[fixture]
    fn registry() -> Registry {
        Registry::from_toml(SCENARIO, no_policy_file).expect("valid registry")
    }

    #[rstest]
    #[case(".gpx", "trail")]
    #[case("KML", "trail")]
    #[case(".JPG", "media")]
    fn extensions_resolve_to_exactly_one_category(
        registry: Registry,
        #[case] extension: &str,
        #[case] expected: &str,
    ) {
        let category = registry.resolve_category(extension).expect("resolve");
        assert_eq!(category.id(), expected);
        let owners = registry
            .categories()
            .filter(|category| category.accepts(extension))
            .count();
        assert_eq!(owners, 1);
    }

    #[rstest]
    fn unknown_extensions_are_reported(registry: Registry) {
        let err = registry.resolve_category(".mp3").expect_err("unmanaged");
        assert_eq!(
            err,
            LookupError::UnknownExtension {
                extension: ".mp3".to_owned()
            }
        );
        assert!(!registry.is_managed_extension(".json"));
    }

    #[rstest]
    fn labels_default_to_the_identifier(registry: Registry) {
        let views = registry.views();
        let media = views.iter().find(|view| view.id == "media").expect("media view");
        assert_eq!(media.label, "media");
        assert_eq!(media.kind, ContentKind::Media);
        assert_eq!(media.policy, "FlatPolicy");
        assert_eq!(media.color.as_deref(), Some("#3366ff"));
        let trail = views.iter().find(|view| view.id == "trail").expect("trail view");
        assert_eq!(trail.label, "Trail");
        assert_eq!(trail.extensions, vec![".gpx".to_owned(), ".kml".to_owned()]);
    }

    #[rstest]
    fn resolve_policy_returns_the_configured_policy(registry: Registry) {
        let media = registry.category("media").expect("media");
        assert!(matches!(registry.resolve_policy(media), PlacementPolicy::Flat));
        let trail = registry.category("trail").expect("trail");
        assert!(matches!(registry.resolve_policy(trail), PlacementPolicy::DateBased));
    }

    #[rstest]
    #[case::empty_id(r#"[categories.""]
type = "track"
extensions = [".gpx"]"#, "EmptyIdentifier")]
    #[case::nested_id(r#"[categories."a/b"]
type = "track"
extensions = [".gpx"]"#, "InvalidIdentifier")]
    #[case::hidden_id(r#"[categories.".cache"]
type = "track"
extensions = [".gpx"]"#, "InvalidIdentifier")]
    #[case::missing_kind(r#"[categories.x]
extensions = [".gpx"]"#, "MissingKind")]
    #[case::no_extensions(r#"[categories.x]
type = "track"
extensions = []"#, "NoExtensions")]
    #[case::missing_dot(r#"[categories.x]
type = "track"
extensions = ["gpx"]"#, "InvalidExtension")]
    #[case::sidecar_suffix(r#"[categories.x]
type = "track"
extensions = [".JSON"]"#, "ReservedExtension")]
    #[case::overlap(r#"[categories.a]
type = "track"
extensions = [".gpx"]
[categories.b]
type = "media"
extensions = [".GPX"]"#, "DuplicateExtension")]
    #[case::bad_toml("[categories.x", "Parse")]
    fn invalid_configuration_fails_fast(#[case] text: &str, #[case] expected: &str) {
        let err = Registry::from_toml(text, no_policy_file).expect_err("invalid configuration");
        let variant = format!("{err:?}");
        assert!(
            variant.starts_with(expected),
            "expected {expected}, got {variant}"
        );
    }

    #[rstest]
    fn configurable_policy_reads_its_routing_file_once() {
        let mut reads = Vec::new();
        let registry = Registry::from_toml(
            r#"
            [categories.rides]
            type = "track"
            extensions = [".gpx"]
            storage_policy = { name = "ConfigurablePolicy", config_file = "routes.toml" }

            [categories.clips]
            type = "media"
            extensions = [".mp4"]
            storage_policy = { name = "ConfigurablePolicy", config_file = "routes.toml" }
            "#,
            |path: &str| {
                reads.push(path.to_owned());
                Ok(Some("[policies]\nclips = \"flat\"\n".to_owned()))
            },
        )
        .expect("valid registry");
        assert_eq!(reads, vec!["routes.toml".to_owned()]);
        let clips = registry.category("clips").expect("clips");
        match registry.resolve_policy(clips) {
            PlacementPolicy::Configurable(ConfigurablePolicy::Routed(table)) => {
                assert_eq!(table.policy_for("clips"), RoutedPolicy::Flat);
                assert_eq!(table.policy_for("rides"), RoutedPolicy::DateBased);
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[rstest]
    fn policy_file_errors_are_reported() {
        let text = r#"
            [categories.rides]
            type = "track"
            extensions = [".gpx"]
            storage_policy = { name = "ConfigurablePolicy" }
        "#;
        let err = Registry::from_toml(text, |_: &str| Err(io::Error::other("denied")))
            .expect_err("unreadable routing file");
        assert!(matches!(err, CategoryConfigError::PolicyFile { ref path, .. } if path == "storage.toml"));

        let err = Registry::from_toml(text, |_: &str| Ok(Some("[policies]\nrides = 3".to_owned())))
            .expect_err("malformed routing file");
        assert!(matches!(err, CategoryConfigError::PolicyFileParse { .. }));
    }

    #[rstest]
    fn templates_replace_a_category_policy(registry: Registry) {
        let template = PlacementTemplate::new(|_: &crate::PlacementRequest<'_>| "inbox".into());
        let registry = registry
            .with_template("media", template)
            .expect("known category");
        let media = registry.category("media").expect("media");
        assert_eq!(registry.resolve_policy(media).name(), "ConfigurablePolicy");
        assert!(matches!(
            registry.with_template("ghost", PlacementTemplate::new(|_: &crate::PlacementRequest<'_>| "x".into())),
            Err(CategoryConfigError::UnknownCategory { .. })
        ));
    }

    #[rstest]
    fn default_layout_is_valid() {
        let registry =
            Registry::load(&RepositoryConfig::default_layout(), no_policy_file).expect("defaults");
        assert_eq!(registry.resolve_category(".gpx").map(Category::id), Ok("tracks"));
        assert_eq!(registry.resolve_category(".fit").map(Category::id), Ok("tracks"));
        assert_eq!(registry.resolve_category(".mov").map(Category::id), Ok("media"));
    }
}
