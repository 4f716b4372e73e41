//! Capability-scoped filesystem layer for trailstore repositories.
//!
//! Paths handed to [`RepoFs`] are relative to a repository root opened
//! through `cap-std`, so callers cannot reach outside the tree they were
//! given. The free functions build the multi-step primitives the engine
//! needs (directory creation with a record of what was created, atomic
//! replace-by-rename writes, and relocation with a cross-device fallback)
//! on top of that trait, which keeps them usable with fault-injecting
//! test doubles.
#![forbid(unsafe_code)]

mod ambient;
mod relocate;
mod root;

pub use ambient::{ensure_dir, read_ambient_file};
pub use relocate::{Relocation, relocate};
pub use root::{
    CapRoot, DirEntry, EntryKind, RepoFs, create_dir_all, discard_file, temp_sibling,
    write_atomic,
};
