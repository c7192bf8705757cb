//! Shared object cache: one bare mirror per remote URL, borrowed from by
//! project clones (`spec.md` §4.2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::git::{CloneOpts, FetchOpts, GitError, Scm};

/// Escapes a remote URL into a filesystem-safe directory name. Collisions
/// are astronomically unlikely at this digest width, and the cache is
/// purely a performance optimization — a false collision only degrades
/// clone speed, it never corrupts a checkout.
fn escape_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", sanitize(url), &digest[..16])
}

fn sanitize(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .chars()
        .take(60)
        .collect()
}

pub struct ObjectCache {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ObjectCache {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root.join(escape_url(url))
    }

    fn lock_for(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("cache lock table poisoned");
        locks.entry(url.to_string()).or_default().clone()
    }

    /// Ensures a cache entry exists, cloning `--bare --mirror` if absent,
    /// then fetches fresh refs. Updates for distinct URLs may run
    /// concurrently; updates for the same URL are serialized by a per-URL
    /// lock (`spec.md` §4.2, "Concurrency").
    pub fn ensure_and_update(
        &self,
        scm: &dyn Scm,
        url: &str,
        revision: Option<&str>,
    ) -> Result<PathBuf, GitError> {
        let path = self.path_for(url);
        let guard = self.lock_for(url);
        let _held = guard.lock().expect("cache lock poisoned");

        let existed = path.is_dir();
        if !existed {
            info!(url, path = %path.display(), "creating bare mirror cache entry");
            scm.clone(
                url,
                &path,
                CloneOpts {
                    reference_cache: None,
                    no_checkout: true,
                    omit_blobs: false,
                    depth: 0,
                },
            )?;
        }

        let fetch_result = scm.fetch(
            &path,
            "origin",
            None,
            FetchOpts {
                tags: true,
                prune: true,
                depth: 0,
                update_shallow: false,
            },
        );
        if let Err(e) = &fetch_result {
            if existed {
                warn!(url, error = %e, "cache update failed, serving stale copy");
            } else {
                return fetch_result.map(|_| path);
            }
        }

        if let Some(revision) = revision {
            if let Err(e) = scm.fetch(&path, "origin", Some(revision), FetchOpts::default()) {
                warn!(url, revision, error = %e, "could not fetch specific revision into cache");
            }
        }

        Ok(path)
    }

    pub fn reference_path(&self, path: &Path) -> Option<&Path> {
        if path.is_dir() {
            Some(path)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_url_is_stable_and_filesystem_safe() {
        let a = escape_url("https://example.com/foo/bar.git");
        let b = escape_url("https://example.com/foo/bar.git");
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn distinct_urls_escape_differently() {
        let a = escape_url("https://example.com/a.git");
        let b = escape_url("https://example.com/b.git");
        assert_ne!(a, b);
    }
}
