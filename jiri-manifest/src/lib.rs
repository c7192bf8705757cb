//! In-memory model, recursive loader, lockfile merging and snapshot support
//! for jiri's manifest graph (`spec.md` §3, §4.3, §4.9).
//!
//! This crate is intentionally free of any git or network dependency: the
//! loader is generic over [`loader::ManifestIo`], and the `jiri` binary
//! crate supplies the `gix`-backed implementation that actually clones
//! manifest repositories.

pub mod csv_set;
pub mod error;
pub mod hook;
pub mod import;
pub mod lockfile;
pub mod loader;
pub mod manifest;
pub mod overrides;
pub mod package;
pub mod project;
pub mod snapshot;
pub mod tree;

pub use error::LoaderError;
pub use hook::Hook;
pub use import::{Import, LocalImport};
pub use lockfile::{Lockfile, LockSet, MergeMode, PackageLock, ProjectLock};
pub use loader::{load, ManifestIo, ResolvedUniverse};
pub use manifest::Manifest;
pub use overrides::{ImportOverride, ProjectOverride};
pub use package::Package;
pub use project::{LocalConfig, Project, ProjectKey};
pub use tree::{ImportCycle, ManifestFileRef};
