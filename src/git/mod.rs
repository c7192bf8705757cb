//! Git adapter: one typed method per git operation the core needs
//! (`spec.md` §4.1).
//!
//! [`gix_impl`] backs the fast, read-mostly operations directly with `gix`,
//! mirroring the teacher's `gix::prepare_clone` / `gix::interrupt` usage in
//! `command::init`. Porcelain operations `gix` does not expose well —
//! rebase, cherry-pick, merge-base walks with conflict markers — shell out
//! to the `git` binary located once via `which`, the same hybrid split
//! `uv`'s git source uses. [`fake`] is the in-memory double the manifest
//! loader tests and update-engine tests run against.

pub mod fake;
pub mod gix_impl;
pub mod shell;

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found on PATH")]
    GitNotFound(#[source] which::Error),

    #[error("network error talking to {remote}: {source}")]
    Network {
        remote: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("checkout of {rev} in {path} would discard local changes")]
    WouldClobber { path: String, rev: String },

    #[error("rev {0} not found")]
    RevNotFound(String),

    #[error("branch {0} does not exist")]
    NoSuchBranch(String),

    #[error("branch {0} already exists")]
    BranchExists(String),

    #[error("git subprocess `{command}` failed: {stderr}")]
    Subprocess { command: String, stderr: String },

    #[error(transparent)]
    Gix(#[from] Box<gix::open::Error>),

    #[error(transparent)]
    GixClone(#[from] Box<gix::clone::Error>),

    #[error(transparent)]
    GixFetch(#[from] Box<gix::clone::fetch::Error>),

    #[error(transparent)]
    GixCheckout(#[from] Box<gix::clone::checkout::main_worktree::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOpts {
    pub tags: bool,
    pub prune: bool,
    pub depth: u32,
    pub update_shallow: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CloneOpts<'a> {
    pub reference_cache: Option<&'a Path>,
    pub no_checkout: bool,
    pub omit_blobs: bool,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOpts {
    pub detach: bool,
}

/// Short status line for a project, as printed by `jiri status` (`spec.md`
/// §4.6/§5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortStatus {
    pub branch: String,
    pub detached: bool,
    pub has_untracked: bool,
    pub has_uncommitted: bool,
}

/// Every git operation the rest of the crate needs, abstracted so the
/// update engine, branch operations, and patch/upload commands can run
/// against a fake in tests (`spec.md` §9, "Dynamic dispatch / polymorphism").
///
/// Implementations serialize all calls against one working tree through a
/// per-path mutex (`spec.md` §4.1, last line); see [`gix_impl::GixScm`] for
/// how that's enforced.
pub trait Scm: Send + Sync {
    fn fetch(
        &self,
        path: &Path,
        remote: &str,
        refspec: Option<&str>,
        opts: FetchOpts,
    ) -> Result<(), GitError>;

    fn clone(&self, url: &str, dest: &Path, opts: CloneOpts<'_>) -> Result<(), GitError>;

    fn checkout(&self, path: &Path, reference: &str, opts: CheckoutOpts) -> Result<(), GitError>;

    fn branch_list(&self, path: &Path) -> Result<Vec<String>, GitError>;
    fn current_branch(&self, path: &Path) -> Result<Option<String>, GitError>;
    fn branch_exists(&self, path: &Path, name: &str) -> Result<bool, GitError>;
    fn create_branch(&self, path: &Path, name: &str, start_point: &str) -> Result<(), GitError>;
    fn create_branch_with_upstream(
        &self,
        path: &Path,
        name: &str,
        start_point: &str,
        upstream: &str,
    ) -> Result<(), GitError>;
    fn delete_branch(&self, path: &Path, name: &str, force: bool) -> Result<(), GitError>;
    fn set_upstream(&self, path: &Path, branch: &str, upstream: &str) -> Result<(), GitError>;

    /// Branches whose tip is an ancestor of `tracking_ref`.
    fn merged_branches(&self, path: &Path, tracking_ref: &str) -> Result<Vec<String>, GitError>;

    fn short_status(&self, path: &Path) -> Result<ShortStatus, GitError>;
    fn has_untracked(&self, path: &Path) -> Result<bool, GitError>;
    fn has_uncommitted(&self, path: &Path) -> Result<bool, GitError>;

    /// Resolves a ref on a remote without cloning (used by `jiri edit`).
    fn ls_remote(&self, remote: &str, reference: &str) -> Result<String, GitError>;

    fn rev_parse(&self, path: &Path, name: &str) -> Result<String, GitError>;
    fn short_hash(&self, path: &Path, rev: &str) -> Result<String, GitError>;
    fn current_revision(&self, path: &Path) -> Result<String, GitError>;
    fn current_revision_of_branch(&self, path: &Path, branch: &str) -> Result<String, GitError>;
    fn commit_msg(&self, path: &Path, rev: &str) -> Result<String, GitError>;
    /// Commits reachable from `a` but not `b`, most recent first.
    fn extra_commits(&self, path: &Path, a: &str, b: &str) -> Result<Vec<String>, GitError>;
    /// Reads a file at a ref without checking out (`git show <ref>:<path>`).
    fn show(&self, path: &Path, reference: &str, file: &str) -> Result<Vec<u8>, GitError>;

    fn cherry_pick(&self, path: &Path, rev: &str) -> Result<(), GitError>;
    fn cherry_pick_abort(&self, path: &Path) -> Result<(), GitError>;
    fn rebase(&self, path: &Path, onto: &str) -> Result<(), GitError>;
    fn rebase_abort(&self, path: &Path) -> Result<(), GitError>;

    /// Points `refname` at `revision` (`git update-ref`). Used to maintain
    /// `refs/jiri/head` (`spec.md` §4.4) without shelling out directly.
    fn update_ref(&self, path: &Path, refname: &str, revision: &str) -> Result<(), GitError>;
}
