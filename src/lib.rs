//! Facade crate for the trailstore repository engine.
//!
//! This crate re-exports the repository engine together with the category,
//! placement and sidecar types callers need to drive it. The format
//! handlers and the filesystem layer are available as modules for callers
//! that register their own handlers or supply their own [`fs::RepoFs`].

#![forbid(unsafe_code)]

pub use trailstore_core::{
    Category, CategoryConfigError, CategoryView, ContentKind, GeographicFeature, PlacementDecision,
    PlacementPolicy, PlacementRequest, Registry, RepositoryConfig, Sidecar, SidecarUpdate,
};
pub use trailstore_repo::{
    CrossKindMoves, ErrorKind, IngestOutcome, IngestRequest, ManagedFile, MoveTarget, Repository,
    RepositoryError, RepositoryOptions,
};

/// Content parsers and the dispatcher that selects them by extension.
pub mod formats {
    pub use trailstore_formats::*;
}

/// Capability-scoped filesystem access below a repository root.
pub mod fs {
    pub use trailstore_fs::*;
}
