//! The top-level error taxonomy (`spec.md` §7).
//!
//! Subsystems raise their own `thiserror` enums (see `git::GitError`,
//! `jiri_manifest::LoaderError`, ...); this module aggregates them the way
//! the CLI entry point needs in order to pick an exit code.

use miette::Diagnostic;
use thiserror::Error;

use crate::git::GitError;
use crate::parallel::MultiError;

#[derive(Debug, Error, Diagnostic)]
pub enum JiriError {
    #[error("usage error: {0}")]
    #[diagnostic(code(jiri::usage))]
    Usage(String),

    #[error("not inside a jiri workspace (no .jiri_root found; set JIRI_ROOT or run from inside one)")]
    #[diagnostic(code(jiri::not_in_workspace))]
    NotInWorkspace,

    #[error(transparent)]
    #[diagnostic(code(jiri::manifest))]
    ManifestParse(#[from] quick_xml::DeError),

    #[error(transparent)]
    #[diagnostic(code(jiri::import_cycle))]
    ImportCycle(#[from] jiri_manifest::ImportCycle),

    #[error("{0}")]
    #[diagnostic(code(jiri::import_conflict))]
    ImportConflict(String),

    #[error("{0}")]
    #[diagnostic(code(jiri::lock_conflict))]
    LockConflict(String),

    #[error(transparent)]
    #[diagnostic(code(jiri::git))]
    Git(#[from] GitError),

    #[error("project {0} has untracked or uncommitted changes")]
    #[diagnostic(code(jiri::working_tree_dirty))]
    WorkingTreeDirty(String),

    #[error("rebase/cherry-pick aborted and rolled back for project {0}")]
    #[diagnostic(code(jiri::rebase_conflict))]
    RebaseConflict(String),

    #[error("project not found: {0}")]
    #[diagnostic(code(jiri::project_not_found))]
    ProjectNotFound(String),

    #[error("hook {0} failed")]
    #[diagnostic(code(jiri::hook))]
    Hook(String),

    #[error("internal invariant violated: {0}")]
    #[diagnostic(code(jiri::fatal_internal))]
    FatalInternal(String),

    #[error("{0} project(s) failed; see warnings above")]
    #[diagnostic(code(jiri::aggregate))]
    Aggregate(#[from] MultiError),

    #[error(transparent)]
    #[diagnostic(code(jiri::io))]
    Io(#[from] std::io::Error),
}

impl JiriError {
    /// Maps an error to the process exit code `spec.md` §6 specifies:
    /// 0 on success, 2 on usage errors, non-zero otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            JiriError::Usage(_) => 2,
            _ => 1,
        }
    }
}
