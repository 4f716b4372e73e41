//! Core domain types for the trailstore repository engine.
//!
//! The crate owns everything that can be decided without touching the
//! filesystem: the validated category registry, placement policies and the
//! decisions they produce, the sidecar metadata model, and the geographic
//! feature that format handlers derive from file content.
//!
//! # Examples
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use trailstore_core::{ContentKind, PlacementRequest, Registry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::from_toml(
//!     r#"
//!     [categories.trail]
//!     name = "Trail"
//!     type = "track"
//!     extensions = [".gpx"]
//!     "#,
//!     |_| Ok(None),
//! )?;
//! let trail = registry.resolve_category(".GPX")?;
//! let recorded = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).single();
//! let decision = registry.resolve_policy(trail).decide(&PlacementRequest {
//!     category: trail.id(),
//!     kind: ContentKind::Track,
//!     file_name: "ride.gpx",
//!     date: recorded,
//!     received_at: Utc::now(),
//! })?;
//! assert_eq!(decision.relative_path().as_str(), "trail/2024/01/ride.gpx");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod category;
mod config;
mod feature;
mod placement;
mod registry;
mod sidecar;
mod timestamp;

pub use category::{Category, CategoryView, ContentKind, extension_of, normalise_extension};
pub use config::{CategoryConfig, DEFAULT_POLICY_FILE, PolicyConfig, RepositoryConfig};
pub use feature::{GeographicFeature, Geometry, TrackLine, TrackPoint};
pub use placement::{
    ConfigurablePolicy, PlacementDecision, PlacementError, PlacementPolicy, PlacementRequest,
    PlacementTemplate, RoutedPolicy, RoutingTable, disambiguated_name, resolve_collision,
};
pub use registry::{CategoryConfigError, LookupError, Registry};
pub use sidecar::{
    DATE_KEY, LATITUDE_KEY, LONGITUDE_KEY, SIDECAR_SUFFIX, Sidecar, SidecarUpdate, sidecar_path,
};
pub use timestamp::parse_timestamp;
