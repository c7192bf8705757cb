//! Bridges `jiri_manifest::loader::ManifestIo` to real git/filesystem
//! access: the only place the pure manifest crate touches the outside
//! world (`spec.md` §4.3).

use std::path::{Path, PathBuf};

use jiri_manifest::{Import, ManifestFileRef};
use jiri_manifest::loader::{ImportCheckout, ManifestIo};
use tempfile::TempDir;
use thiserror::Error;

use crate::cache::ObjectCache;
use crate::context::WorkspaceContext;
use crate::git::{CloneOpts, FetchOpts, GitError, Scm};

#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("manifest file not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("manifest file is not valid UTF-8: {0}")]
    Utf8(String),
}

/// Checkouts created in non-update mode (e.g. `jiri resolve`) live in a
/// temp directory for the lifetime of the loader; kept here so they aren't
/// dropped (and deleted) mid-resolution.
pub struct RealManifestIo<'a> {
    ctx: &'a WorkspaceContext,
    scm: &'a dyn Scm,
    cache: &'a ObjectCache,
    temp_checkouts: Vec<TempDir>,
}

impl<'a> RealManifestIo<'a> {
    pub fn new(ctx: &'a WorkspaceContext, scm: &'a dyn Scm, cache: &'a ObjectCache) -> Self {
        Self {
            ctx,
            scm,
            cache,
            temp_checkouts: Vec::new(),
        }
    }

    fn read_from_filesystem(&self, file: &str) -> Result<String, IoError> {
        let path = self.ctx.root.join(file);
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IoError::NotFound(path.display().to_string())
            } else {
                IoError::Io(e)
            }
        })
    }

    fn read_from_git_object(&self, repo_path: &str, git_ref: &str, file: &str) -> Result<String, IoError> {
        let repo_abs = self.ctx.root.join(repo_path);
        let bytes = self.scm.show(&repo_abs, git_ref, file)?;
        String::from_utf8(bytes).map_err(|_| IoError::Utf8(file.to_string()))
    }
}

impl<'a> ManifestIo for RealManifestIo<'a> {
    type Error = IoError;

    fn read_file(&mut self, reference: &ManifestFileRef) -> Result<String, Self::Error> {
        if reference.is_local() {
            self.read_from_filesystem(&reference.file)
        } else {
            self.read_from_git_object(&reference.repo_path, &reference.git_ref, &reference.file)
        }
    }

    fn ensure_import(
        &mut self,
        import: &Import,
        update_mode: bool,
        _local_manifest_mode: bool,
    ) -> Result<ImportCheckout, Self::Error> {
        let dest: PathBuf = if update_mode {
            self.ctx.root.join(&import.name)
        } else {
            let tmp = tempfile::tempdir()?;
            let path = tmp.path().to_path_buf();
            self.temp_checkouts.push(tmp);
            path
        };

        if !dest.join(".git").exists() {
            let cached = self
                .cache
                .ensure_and_update(self.scm, &import.remote, non_empty(&import.revision))?;
            self.scm.clone(
                &import.remote,
                &dest,
                CloneOpts {
                    reference_cache: Some(cached.as_path()),
                    no_checkout: false,
                    omit_blobs: false,
                    depth: 0,
                },
            )?;
        } else {
            self.scm.fetch(&dest, "origin", None, FetchOpts::default())?;
        }

        let revision = if !import.revision.is_empty() {
            import.revision.clone()
        } else if let Ok(jiri_head) = self.scm.rev_parse(&dest, "refs/jiri/head") {
            jiri_head
        } else {
            self.scm
                .current_revision_of_branch(&dest, &format!("origin/{}", import.remote_branch))?
        };

        let repo_path = dest
            .strip_prefix(&self.ctx.root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| dest.display().to_string());

        Ok(ImportCheckout { repo_path, revision })
    }

    fn sibling_lockfiles(&mut self, manifest_ref: &ManifestFileRef) -> Result<Vec<ManifestFileRef>, Self::Error> {
        let dir = self.parent_dir(&manifest_ref.file).unwrap_or_default();

        if manifest_ref.is_local() {
            let abs_dir = self.ctx.root.join(&dir);
            let mut refs = Vec::new();
            if abs_dir.is_dir() {
                for entry in std::fs::read_dir(&abs_dir)? {
                    let entry = entry?;
                    if is_lockfile(&entry.file_name().to_string_lossy()) {
                        let file = if dir.is_empty() {
                            entry.file_name().to_string_lossy().into_owned()
                        } else {
                            format!("{dir}/{}", entry.file_name().to_string_lossy())
                        };
                        refs.push(ManifestFileRef::local(file));
                    }
                }
            }
            Ok(refs)
        } else {
            let repo_abs = self.ctx.root.join(&manifest_ref.repo_path);
            let out = crate::git::shell::run_ok(
                &repo_abs,
                &["ls-tree", "--name-only", &manifest_ref.git_ref, if dir.is_empty() { "." } else { &dir }],
            )?;
            Ok(out
                .lines()
                .filter(|name| is_lockfile(name))
                .map(|name| ManifestFileRef::remote(manifest_ref.repo_path.clone(), name.to_string(), manifest_ref.git_ref.clone()))
                .collect())
        }
    }
}

fn is_lockfile(name: &str) -> bool {
    name == jiri_manifest::loader::LOCKFILE_NAME
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
