//! In-memory [`Scm`] double for update-engine and branch-operation tests,
//! the git-side analogue of `jiri_manifest::loader`'s `FakeSource`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CheckoutOpts, CloneOpts, FetchOpts, GitError, Scm, ShortStatus};

#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    pub branches: HashMap<String, String>,
    pub head: Option<String>,
    pub detached_at: Option<String>,
    pub untracked: bool,
    pub uncommitted: bool,
    pub upstreams: HashMap<String, String>,
    pub commit_messages: HashMap<String, String>,
    /// Refs other than `refs/heads/*`, e.g. `refs/jiri/head` (`update_ref`).
    pub refs: HashMap<String, String>,
}

/// Replays fixtures set up by a test instead of touching real working
/// trees. Keyed by project path.
#[derive(Default)]
pub struct FakeScm {
    repos: Mutex<HashMap<PathBuf, FakeRepo>>,
}

impl FakeScm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, path: impl Into<PathBuf>, repo: FakeRepo) {
        self.repos.lock().unwrap().insert(path.into(), repo);
    }

    fn with_repo<T>(&self, path: &Path, f: impl FnOnce(&mut FakeRepo) -> Result<T, GitError>) -> Result<T, GitError> {
        let mut repos = self.repos.lock().unwrap();
        let repo = repos
            .get_mut(path)
            .ok_or_else(|| GitError::RevNotFound(path.display().to_string()))?;
        f(repo)
    }
}

impl Scm for FakeScm {
    fn fetch(&self, path: &Path, _remote: &str, _refspec: Option<&str>, _opts: FetchOpts) -> Result<(), GitError> {
        self.with_repo(path, |_| Ok(()))
    }

    fn clone(&self, _url: &str, dest: &Path, _opts: CloneOpts<'_>) -> Result<(), GitError> {
        self.seed(dest, FakeRepo::default());
        Ok(())
    }

    fn checkout(&self, path: &Path, reference: &str, opts: CheckoutOpts) -> Result<(), GitError> {
        self.with_repo(path, |repo| {
            if repo.uncommitted || repo.untracked {
                return Err(GitError::WouldClobber {
                    path: path.display().to_string(),
                    rev: reference.to_string(),
                });
            }
            if opts.detach {
                repo.detached_at = Some(reference.to_string());
                repo.head = None;
            } else {
                repo.head = Some(reference.to_string());
                repo.detached_at = None;
            }
            Ok(())
        })
    }

    fn branch_list(&self, path: &Path) -> Result<Vec<String>, GitError> {
        self.with_repo(path, |repo| Ok(repo.branches.keys().cloned().collect()))
    }

    fn current_branch(&self, path: &Path) -> Result<Option<String>, GitError> {
        self.with_repo(path, |repo| Ok(repo.head.clone()))
    }

    fn branch_exists(&self, path: &Path, name: &str) -> Result<bool, GitError> {
        self.with_repo(path, |repo| Ok(repo.branches.contains_key(name)))
    }

    fn create_branch(&self, path: &Path, name: &str, start_point: &str) -> Result<(), GitError> {
        self.with_repo(path, |repo| {
            if repo.branches.contains_key(name) {
                return Err(GitError::BranchExists(name.to_string()));
            }
            repo.branches.insert(name.to_string(), start_point.to_string());
            Ok(())
        })
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

    fn delete_branch(&self, path: &Path, name: &str, _force: bool) -> Result<(), GitError> {
        self.with_repo(path, |repo| {
            repo.branches
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| GitError::NoSuchBranch(name.to_string()))
        })
    }

    fn set_upstream(&self, path: &Path, branch: &str, upstream: &str) -> Result<(), GitError> {
        self.with_repo(path, |repo| {
            repo.upstreams.insert(branch.to_string(), upstream.to_string());
            Ok(())
        })
    }

    fn merged_branches(&self, path: &Path, tracking_ref: &str) -> Result<Vec<String>, GitError> {
        self.with_repo(path, |repo| {
            Ok(repo
                .branches
                .iter()
                .filter(|(_, tip)| tip.as_str() == tracking_ref)
                .map(|(name, _)| name.clone())
                .collect())
        })
    }

    fn short_status(&self, path: &Path) -> Result<ShortStatus, GitError> {
        self.with_repo(path, |repo| {
            Ok(ShortStatus {
                branch: repo.head.clone().unwrap_or_else(|| "HEAD".to_string()),
                detached: repo.head.is_none(),
                has_untracked: repo.untracked,
                has_uncommitted: repo.uncommitted,
            })
        })
    }

    fn has_untracked(&self, path: &Path) -> Result<bool, GitError> {
        self.with_repo(path, |repo| Ok(repo.untracked))
    }

    fn has_uncommitted(&self, path: &Path) -> Result<bool, GitError> {
        self.with_repo(path, |repo| Ok(repo.uncommitted))
    }

    fn ls_remote(&self, _remote: &str, reference: &str) -> Result<String, GitError> {
        Ok(format!("fake-{reference}"))
    }

    fn rev_parse(&self, path: &Path, name: &str) -> Result<String, GitError> {
        self.with_repo(path, |repo| {
            Ok(repo
                .refs
                .get(name)
                .or_else(|| repo.branches.get(name))
                .cloned()
                .unwrap_or_else(|| name.to_string()))
        })
    }

    fn short_hash(&self, path: &Path, rev: &str) -> Result<String, GitError> {
        self.rev_parse(path, rev).map(|r| r.chars().take(7).collect())
    }

    fn current_revision(&self, path: &Path) -> Result<String, GitError> {
        self.with_repo(path, |repo| {
            Ok(repo
                .detached_at
                .clone()
                .or_else(|| repo.head.as_ref().and_then(|h| repo.branches.get(h).cloned()))
                .unwrap_or_else(|| "0".repeat(40)))
        })
    }

    fn current_revision_of_branch(&self, path: &Path, branch: &str) -> Result<String, GitError> {
        self.with_repo(path, |repo| {
            repo.branches
                .get(branch)
                .cloned()
                .ok_or_else(|| GitError::NoSuchBranch(branch.to_string()))
        })
    }

    fn commit_msg(&self, path: &Path, rev: &str) -> Result<String, GitError> {
        self.with_repo(path, |repo| {
            Ok(repo.commit_messages.get(rev).cloned().unwrap_or_default())
        })
    }

    fn extra_commits(&self, _path: &Path, _a: &str, _b: &str) -> Result<Vec<String>, GitError> {
        Ok(Vec::new())
    }

    fn show(&self, _path: &Path, _reference: &str, _file: &str) -> Result<Vec<u8>, GitError> {
        Ok(Vec::new())
    }

    fn cherry_pick(&self, path: &Path, _rev: &str) -> Result<(), GitError> {
        self.with_repo(path, |_| Ok(()))
    }

    fn cherry_pick_abort(&self, path: &Path) -> Result<(), GitError> {
        self.with_repo(path, |_| Ok(()))
    }

    fn rebase(&self, path: &Path, _onto: &str) -> Result<(), GitError> {
        self.with_repo(path, |_| Ok(()))
    }

    fn rebase_abort(&self, path: &Path) -> Result<(), GitError> {
        self.with_repo(path, |_| Ok(()))
    }

    fn update_ref(&self, path: &Path, refname: &str, revision: &str) -> Result<(), GitError> {
        self.with_repo(path, |repo| {
            repo.refs.insert(refname.to_string(), revision.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_refuses_to_clobber_dirty_tree() {
        let scm = FakeScm::new();
        let path = PathBuf::from("/ws/proj");
        scm.seed(
            &path,
            FakeRepo {
                uncommitted: true,
                ..Default::default()
            },
        );
        let err = scm.checkout(&path, "main", CheckoutOpts::default()).unwrap_err();
        assert!(matches!(err, GitError::WouldClobber { .. }));
    }

    #[test]
    fn merged_branches_filters_by_tip() {
        let scm = FakeScm::new();
        let path = PathBuf::from("/ws/proj");
        let mut repo = FakeRepo::default();
        repo.branches.insert("a".into(), "deadbeef".into());
        repo.branches.insert("b".into(), "other".into());
        scm.seed(&path, repo);
        let merged = scm.merged_branches(&path, "deadbeef").unwrap();
        assert_eq!(merged, vec!["a".to_string()]);
    }
}
