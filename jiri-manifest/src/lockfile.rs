use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::ProjectKey;

/// Pins a project to a concrete revision (`spec.md` §3, "Lockfile entry",
/// "Project-lock").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLock {
    pub name: String,
    pub remote: String,
    pub revision: String,
}

impl ProjectLock {
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.name.clone(), self.remote.clone())
    }
}

/// Pins a package instance for one platform (`spec.md` §3, "Package-lock").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLock {
    pub package_name: String,
    pub platform: String,
    pub version_tag: String,
    pub instance_id: String,
}

impl PackageLock {
    pub fn key(&self) -> (String, String) {
        (self.package_name.clone(), self.platform.clone())
    }
}

/// One lockfile's worth of entries, as read from disk (or from a git blob
/// via `git show`, per `spec.md` §4.3 "Lockfile merging").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub projects: Vec<ProjectLock>,
    #[serde(default)]
    pub packages: Vec<PackageLock>,
}

/// Accumulates lockfile entries across every lockfile the loader encounters,
/// enforcing the conflict rules of `spec.md` §3 and §4.3.
#[derive(Debug, Clone, Default)]
pub struct LockSet {
    pub projects: IndexMap<ProjectKey, String>,
    pub packages: IndexMap<(String, String), (String, String)>,
}

/// Resolution mode governing how package-lock conflicts are handled.
/// Project-lock conflicts are *never* tolerated except in
/// [`MergeMode::ImportOverride`], per `spec.md` §3's invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// The default: both project-lock and package-lock conflicts fail.
    Strict,
    /// `resolve` updating a single file: package-lock conflicts are
    /// tolerated (last writer wins), project-lock conflicts still fail.
    IgnorePackageLockConflicts,
    /// Import-override mode: no conflicts of either kind fail. Per
    /// `spec.md` §3: "import-override mode suppresses conflicts entirely."
    ImportOverride,
}

#[derive(Debug, Error)]
pub enum LockConflict {
    #[error(
        "project lock conflict for {name} ({remote}): {existing} vs {incoming}"
    )]
    Project {
        name: String,
        remote: String,
        existing: String,
        incoming: String,
    },
    #[error(
        "package lock conflict for {package_name} on {platform}: {existing:?} vs {incoming:?}"
    )]
    Package {
        package_name: String,
        platform: String,
        existing: (String, String),
        incoming: (String, String),
    },
}

impl LockSet {
    pub fn merge(&mut self, lockfile: &Lockfile, mode: MergeMode) -> Result<(), LockConflict> {
        for entry in &lockfile.projects {
            let key = entry.key();
            match self.projects.get(&key) {
                Some(existing) if existing != &entry.revision => {
                    if mode == MergeMode::ImportOverride {
                        self.projects.insert(key, entry.revision.clone());
                    } else {
                        return Err(LockConflict::Project {
                            name: entry.name.clone(),
                            remote: entry.remote.clone(),
                            existing: existing.clone(),
                            incoming: entry.revision.clone(),
                        });
                    }
                }
                _ => {
                    self.projects.insert(key, entry.revision.clone());
                }
            }
        }

        for entry in &lockfile.packages {
            let key = entry.key();
            let incoming = (entry.version_tag.clone(), entry.instance_id.clone());
            match self.packages.get(&key) {
                Some(existing) if existing != &incoming => {
                    if matches!(
                        mode,
                        MergeMode::IgnorePackageLockConflicts | MergeMode::ImportOverride
                    ) {
                        self.packages.insert(key, incoming);
                    } else {
                        return Err(LockConflict::Package {
                            package_name: entry.package_name.clone(),
                            platform: entry.platform.clone(),
                            existing: existing.clone(),
                            incoming,
                        });
                    }
                }
                _ => {
                    self.packages.insert(key, incoming);
                }
            }
        }

        Ok(())
    }

    pub fn revision_for(&self, key: &ProjectKey) -> Option<&str> {
        self.projects.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(name: &str, rev: &str) -> Lockfile {
        Lockfile {
            projects: vec![ProjectLock {
                name: name.into(),
                remote: "r".into(),
                revision: rev.into(),
            }],
            packages: vec![],
        }
    }

    #[test]
    fn identical_project_locks_merge_idempotently() {
        let mut set = LockSet::default();
        set.merge(&lock("p", "r1"), MergeMode::Strict).unwrap();
        set.merge(&lock("p", "r1"), MergeMode::Strict).unwrap();
        assert_eq!(set.projects.len(), 1);
    }

    #[test]
    fn conflicting_project_locks_fail_by_default() {
        let mut set = LockSet::default();
        set.merge(&lock("p", "r1"), MergeMode::Strict).unwrap();
        let err = set.merge(&lock("p", "r2"), MergeMode::Strict).unwrap_err();
        assert!(matches!(err, LockConflict::Project { .. }));
    }

    #[test]
    fn conflicting_project_locks_still_fail_under_ignore_package_conflicts() {
        let mut set = LockSet::default();
        set.merge(&lock("p", "r1"), MergeMode::Strict).unwrap();
        let err = set
            .merge(&lock("p", "r2"), MergeMode::IgnorePackageLockConflicts)
            .unwrap_err();
        assert!(matches!(err, LockConflict::Project { .. }));
    }

    #[test]
    fn import_override_suppresses_project_conflicts() {
        let mut set = LockSet::default();
        set.merge(&lock("p", "r1"), MergeMode::Strict).unwrap();
        set.merge(&lock("p", "r2"), MergeMode::ImportOverride).unwrap();
        assert_eq!(set.projects.get(&ProjectKey::new("p", "r")).unwrap(), "r2");
    }

    #[test]
    fn package_lock_conflicts_fail_by_default_but_not_in_ignore_mode() {
        let mut set = LockSet::default();
        let a = Lockfile {
            projects: vec![],
            packages: vec![PackageLock {
                package_name: "pkg".into(),
                platform: "linux-amd64".into(),
                version_tag: "v1".into(),
                instance_id: "a".into(),
            }],
        };
        let b = Lockfile {
            projects: vec![],
            packages: vec![PackageLock {
                package_name: "pkg".into(),
                platform: "linux-amd64".into(),
                version_tag: "v2".into(),
                instance_id: "b".into(),
            }],
        };
        set.merge(&a, MergeMode::Strict).unwrap();
        assert!(matches!(
            set.merge(&b, MergeMode::Strict).unwrap_err(),
            LockConflict::Package { .. }
        ));
        set.merge(&b, MergeMode::IgnorePackageLockConflicts).unwrap();
    }
}
