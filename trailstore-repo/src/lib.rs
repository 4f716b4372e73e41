//! Repository engine for category-organised GPS tracks and geotagged media.
//!
//! [`Repository`] ties the pieces together: a validated
//! [`Registry`](trailstore_core::Registry) chooses categories and placement
//! policies, a [`FormatDispatcher`](trailstore_formats::FormatDispatcher)
//! parses content for dates and geometry, and [`SidecarStore`] keeps manual
//! overrides beside each file. Multi-step mutations record compensating
//! actions as they go and undo them on failure, so a file is always either
//! at its old path or its new one.
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use trailstore_repo::{IngestRequest, Repository};
//!
//! # fn main() -> Result<(), trailstore_repo::RepositoryError> {
//! let repo = Repository::open(Utf8Path::new("/srv/outings"))?;
//! let gpx = br#"<gpx><metadata><time>2024-01-15T09:30:00Z</time></metadata></gpx>"#;
//! let stored = repo.ingest(&IngestRequest::new("ride.gpx", gpx))?;
//! assert_eq!(stored.path.as_str(), "tracks/2024/01/ride.gpx");
//! for path in repo.list() {
//!     println!("{}", path?);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod engine;
mod error;
mod journal;
mod listing;
mod lock;
mod path;
mod sidecar_store;

pub use engine::{
    CONFIG_FILE, CrossKindMoves, IngestOutcome, IngestRequest, ManagedFile, MoveTarget, Repository,
    RepositoryOptions,
};
pub use error::{ErrorKind, RepositoryError};
pub use listing::ManagedFiles;
pub use lock::{PathGuard, PathLocks};
pub use sidecar_store::SidecarStore;
