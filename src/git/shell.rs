//! Subprocess fallback for git porcelain `gix` doesn't implement: rebase
//! and cherry-pick, both of which need conflict-aware working-tree
//! mutation. Mirrors the `which::which("git")` caching pattern `uv`'s git
//! source uses, minus the middleware plumbing this crate doesn't need.

use std::path::Path;
use std::process::{Command, Output};
use std::sync::OnceLock;

use super::GitError;

fn git_binary() -> Result<&'static Path, GitError> {
    static GIT: OnceLock<Result<std::path::PathBuf, which::Error>> = OnceLock::new();
    GIT.get_or_init(|| which::which("git"))
        .as_deref()
        .map_err(|e| GitError::GitNotFound(clone_which_error(e)))
}

// `which::Error` isn't `Clone`; the cache only ever needs to hand back the
// "not found" case, so reconstruct that variant rather than storing a copy.
fn clone_which_error(_e: &which::Error) -> which::Error {
    which::Error::CannotFindBinaryPath
}

pub fn run(path: &Path, args: &[&str]) -> Result<Output, GitError> {
    let git = git_binary()?;
    let output = Command::new(git)
        .args(args)
        .current_dir(path)
        .output()
        .map_err(GitError::Io)?;
    Ok(output)
}

pub fn run_ok(path: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = run(path, args)?;
    if !output.status.success() {
        return Err(GitError::Subprocess {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn rebase(path: &Path, onto: &str) -> Result<(), GitError> {
    run_ok(path, &["rebase", onto]).map(|_| ())
}

pub fn rebase_abort(path: &Path) -> Result<(), GitError> {
    run_ok(path, &["rebase", "--abort"]).map(|_| ())
}

pub fn cherry_pick(path: &Path, rev: &str) -> Result<(), GitError> {
    run_ok(path, &["cherry-pick", rev]).map(|_| ())
}

pub fn cherry_pick_abort(path: &Path) -> Result<(), GitError> {
    run_ok(path, &["cherry-pick", "--abort"]).map(|_| ())
}
