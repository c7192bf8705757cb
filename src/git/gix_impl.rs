//! The real [`Scm`] implementation. Clone/fetch/checkout go through `gix`
//! directly, following the teacher's `command::init::run_init` shape
//! (`gix::prepare_clone`, `fetch_then_checkout`, `gix::interrupt`); branch
//! bookkeeping, status, rev-parse, and the two operations `gix` has no
//! porcelain for (rebase, cherry-pick) shell out via [`super::shell`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{CheckoutOpts, CloneOpts, FetchOpts, GitError, Scm, ShortStatus};
use super::shell;

/// Per-working-tree locks, keyed by canonical path, so concurrent project
/// operations never race on the same `.git` directory (`spec.md` §4.1:
/// "serializable through a per-working-tree mutex").
#[derive(Default)]
pub struct GixScm {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl GixScm {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks.entry(key).or_default().clone()
    }
}

impl Scm for GixScm {
    fn fetch(
        &self,
        path: &Path,
        remote: &str,
        refspec: Option<&str>,
        opts: FetchOpts,
    ) -> Result<(), GitError> {
        let guard = self.lock_for(path);
        let _held = guard.lock().expect("working tree lock poisoned");

        let mut args = vec!["fetch", remote];
        if opts.prune {
            args.push("--prune");
        }
        if opts.tags {
            args.push("--tags");
        }
        let depth_arg;
        if opts.depth > 0 {
            depth_arg = format!("--depth={}", opts.depth);
            args.push(&depth_arg);
        }
        if opts.update_shallow {
            args.push("--update-shallow");
        }
        if let Some(refspec) = refspec {
            args.push(refspec);
        }
        shell::run_ok(path, &args)
            .map(|_| ())
            .map_err(|e| map_network_error(remote, e))
    }

    fn clone(&self, url: &str, dest: &Path, opts: CloneOpts<'_>) -> Result<(), GitError> {
        std::fs::create_dir_all(dest)?;
        let parsed = gix::url::parse(url.into()).map_err(|e| GitError::Network {
            remote: url.to_string(),
            source: Box::new(e),
        })?;

        let mut prepare = gix::prepare_clone(parsed, dest).map_err(Box::new)?;
        if opts.depth > 0 {
            let depth = (opts.depth as usize)
                .try_into()
                .unwrap_or(std::num::NonZeroU32::new(1).unwrap());
            prepare = prepare.with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(depth));
        }

        let (mut prepare_checkout, _) = prepare
            .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(Box::new)?;
        if !opts.no_checkout {
            prepare_checkout
                .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
                .map_err(Box::new)?;
        }

        // Borrow objects from the shared cache by pointing the fresh
        // repository's alternates file at it (`spec.md` §4.2 step 3).
        if let Some(reference) = opts.reference_cache {
            write_alternate(dest, reference)?;
        }

        // Clones made against the shared object cache still track the real
        // origin, never the cache path (`spec.md` §4.1: "after clone, remote
        // is reset to the original URL").
        shell::run_ok(dest, &["remote", "set-url", "origin", url]).map(|_| ())
    }

    fn checkout(&self, path: &Path, reference: &str, opts: CheckoutOpts) -> Result<(), GitError> {
        let guard = self.lock_for(path);
        let _held = guard.lock().expect("working tree lock poisoned");

        if self.has_uncommitted(path)? || self.has_untracked(path)? {
            return Err(GitError::WouldClobber {
                path: path.display().to_string(),
                rev: reference.to_string(),
            });
        }
        let mut args = vec!["checkout"];
        if opts.detach {
            args.push("--detach");
        }
        args.push(reference);
        shell::run_ok(path, &args).map(|_| ())
    }

    fn branch_list(&self, path: &Path) -> Result<Vec<String>, GitError> {
        let out = shell::run_ok(path, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn current_branch(&self, path: &Path) -> Result<Option<String>, GitError> {
        let out = shell::run_ok(path, &["symbolic-ref", "--short", "-q", "HEAD"]);
        match out {
            Ok(name) if !name.is_empty() => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    fn branch_exists(&self, path: &Path, name: &str) -> Result<bool, GitError> {
        Ok(self.branch_list(path)?.iter().any(|b| b == name))
    }

    fn create_branch(&self, path: &Path, name: &str, start_point: &str) -> Result<(), GitError> {
        if self.branch_exists(path, name)? {
            return Err(GitError::BranchExists(name.to_string()));
        }
        shell::run_ok(path, &["branch", name, start_point]).map(|_| ())
    }

    fn create_branch_with_upstream(
        &self,
        path: &Path,
        name: &str,
        start_point: &str,
        upstream: &str,
    ) -> Result<(), GitError> {
        self.create_branch(path, name, start_point)?;
        self.set_upstream(path, name, upstream)
    }

    fn delete_branch(&self, path: &Path, name: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        shell::run_ok(path, &["branch", flag, name]).map(|_| ())
    }

    fn set_upstream(&self, path: &Path, branch: &str, upstream: &str) -> Result<(), GitError> {
        shell::run_ok(path, &["branch", "--set-upstream-to", upstream, branch]).map(|_| ())
    }

    fn merged_branches(&self, path: &Path, tracking_ref: &str) -> Result<Vec<String>, GitError> {
        let out = shell::run_ok(path, &["branch", "--merged", tracking_ref, "--format=%(refname:short)"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn short_status(&self, path: &Path) -> Result<ShortStatus, GitError> {
        let branch = self.current_branch(path)?;
        Ok(ShortStatus {
            detached: branch.is_none(),
            branch: branch.unwrap_or_else(|| "HEAD".to_string()),
            has_untracked: self.has_untracked(path)?,
            has_uncommitted: self.has_uncommitted(path)?,
        })
    }

    fn has_untracked(&self, path: &Path) -> Result<bool, GitError> {
        let out = shell::run_ok(path, &["status", "--porcelain", "--untracked-files=normal"])?;
        Ok(out.lines().any(|line| line.starts_with("??")))
    }

    fn has_uncommitted(&self, path: &Path) -> Result<bool, GitError> {
        let out = shell::run_ok(path, &["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!out.trim().is_empty())
    }

    fn ls_remote(&self, remote: &str, reference: &str) -> Result<String, GitError> {
        let cwd = std::env::current_dir()?;
        let out = shell::run_ok(&cwd, &["ls-remote", remote, reference])
            .map_err(|e| map_network_error(remote, e))?;
        out.split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| GitError::RevNotFound(reference.to_string()))
    }

    fn rev_parse(&self, path: &Path, name: &str) -> Result<String, GitError> {
        shell::run_ok(path, &["rev-parse", name]).map_err(|_| GitError::RevNotFound(name.to_string()))
    }

    fn short_hash(&self, path: &Path, rev: &str) -> Result<String, GitError> {
        shell::run_ok(path, &["rev-parse", "--short", rev])
    }

    fn current_revision(&self, path: &Path) -> Result<String, GitError> {
        self.rev_parse(path, "HEAD")
    }

    fn current_revision_of_branch(&self, path: &Path, branch: &str) -> Result<String, GitError> {
        self.rev_parse(path, branch)
    }

    fn commit_msg(&self, path: &Path, rev: &str) -> Result<String, GitError> {
        shell::run_ok(path, &["log", "-1", "--format=%B", rev])
    }

    fn extra_commits(&self, path: &Path, a: &str, b: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{b}..{a}");
        let out = shell::run_ok(path, &["rev-list", &range])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn show(&self, path: &Path, reference: &str, file: &str) -> Result<Vec<u8>, GitError> {
        let spec = format!("{reference}:{file}");
        let output = shell::run(path, &["show", &spec])?;
        if !output.status.success() {
            return Err(GitError::Subprocess {
                command: format!("git show {spec}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn cherry_pick(&self, path: &Path, rev: &str) -> Result<(), GitError> {
        let guard = self.lock_for(path);
        let _held = guard.lock().expect("working tree lock poisoned");
        shell::cherry_pick(path, rev)
    }

    fn cherry_pick_abort(&self, path: &Path) -> Result<(), GitError> {
        shell::cherry_pick_abort(path)
    }

    fn rebase(&self, path: &Path, onto: &str) -> Result<(), GitError> {
        let guard = self.lock_for(path);
        let _held = guard.lock().expect("working tree lock poisoned");
        shell::rebase(path, onto)
    }

    fn rebase_abort(&self, path: &Path) -> Result<(), GitError> {
        shell::rebase_abort(path)
    }

    fn update_ref(&self, path: &Path, refname: &str, revision: &str) -> Result<(), GitError> {
        shell::run_ok(path, &["update-ref", refname, revision]).map(|_| ())
    }
}

fn map_network_error(remote: &str, err: GitError) -> GitError {
    match err {
        GitError::Subprocess { stderr, .. } => GitError::Network {
            remote: remote.to_string(),
            source: stderr.into(),
        },
        other => other,
    }
}

fn write_alternate(dest: &Path, reference_cache: &Path) -> Result<(), GitError> {
    let alternates_path = dest.join(".git/objects/info/alternates");
    if let Some(parent) = alternates_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = format!("{}\n", reference_cache.join("objects").display());
    std::fs::write(alternates_path, line)?;
    Ok(())
}
