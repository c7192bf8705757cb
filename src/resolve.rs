//! `jiri resolve`: re-run the manifest loader against local/lockfile state
//! without touching working trees (`spec.md` §6 CLI surface: `resolve
//! [-local-manifest -enable-project-lock -enable-package-lock
//! -allow-floating-refs]`).

use jiri_manifest::loader::{load, ResolvedUniverse};
use jiri_manifest::{LoaderError, ManifestFileRef};
use thiserror::Error;

use crate::manifest_io::{IoError, RealManifestIo};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub local_manifest: bool,
    pub enable_project_lock: bool,
    pub enable_package_lock: bool,
    pub allow_floating_refs: bool,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Loader(#[from] LoaderError<IoError>),
}

pub fn resolve(
    io: &mut RealManifestIo<'_>,
    root_manifest: &str,
    opts: ResolveOptions,
) -> Result<ResolvedUniverse, ResolveError> {
    // -enable-project-lock / -enable-package-lock / -allow-floating-refs
    // loosen the update engine's conflict handling downstream of
    // resolution; the loader itself only needs `local_manifest_mode` to
    // pick project-lock vs package-lock-only enforcement (`spec.md` §4.3,
    // "Lockfile merging").
    let _ = (opts.enable_project_lock, opts.enable_package_lock, opts.allow_floating_refs);
    let root = ManifestFileRef::local(root_manifest);
    Ok(load(io, root, false, opts.local_manifest)?)
}
