use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::csv_set;

fn default_remote_branch() -> String {
    "master".to_string()
}

fn is_default_remote_branch(branch: &str) -> bool {
    branch == "master"
}

/// Identity of a [`Project`]: the loader never admits two distinct projects
/// sharing a `(name, remote)` pair, and the resolved universe is keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectKey {
    pub name: String,
    pub remote: String,
}

impl ProjectKey {
    pub fn new(name: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: remote.into(),
        }
    }
}

/// Per-project flags persisted at `<project>/.jiri/config`.
///
/// These are never part of the manifest XML; they're local overrides a
/// developer sets with `jiri project-config` and the update engine consults
/// before touching a working tree (see `spec.md` §3, §4.4 step 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Skip this project entirely during `update`.
    #[serde(default)]
    pub ignore: bool,
    /// Leave the working tree untouched during `update`.
    #[serde(default)]
    pub no_update: bool,
    /// Fetch but never rebase the local branch, regardless of CLI flags.
    #[serde(default)]
    pub no_rebase: bool,
}

/// A single git working tree under the workspace, as declared by a manifest
/// (`spec.md` §3, "Project").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@remote")]
    pub remote: String,

    /// Path relative to the workspace root. The loader prepends the
    /// enclosing import's `root` attribute and canonicalizes this to an
    /// absolute path once the universe is resolved.
    #[serde(rename = "@path")]
    pub path: String,

    /// Commit id this project is pinned to, or empty to track the tip of
    /// `remote_branch`.
    #[serde(rename = "@revision", default, skip_serializing_if = "String::is_empty")]
    pub revision: String,

    #[serde(
        rename = "@remotebranch",
        default = "default_remote_branch",
        skip_serializing_if = "is_default_remote_branch"
    )]
    pub remote_branch: String,

    #[serde(rename = "@gerrithost", default, skip_serializing_if = "Option::is_none")]
    pub gerrit_host: Option<String>,

    #[serde(rename = "@githooks", default, skip_serializing_if = "Option::is_none")]
    pub githooks_path: Option<String>,

    /// 0 means a full clone.
    #[serde(rename = "@historydepth", default)]
    pub history_depth: u32,

    #[serde(rename = "@attributes", default, with = "csv_set")]
    pub attributes: BTreeSet<String>,

    /// Set when the project is declared as a git submodule of its parent
    /// rather than a plain manifest project.
    #[serde(rename = "@gitsubmodules", default)]
    pub git_submodules: bool,

    /// Which manifest file declared this project; filled in by the loader,
    /// never present in the XML itself.
    #[serde(skip, default)]
    pub manifest_path: String,

    /// Local, non-manifest flags read from `<project>/.jiri/config`. Filled
    /// in by the update engine's local scan, not by the loader.
    #[serde(skip, default)]
    pub local_config: LocalConfig,
}

impl Project {
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.name.clone(), self.remote.clone())
    }

    pub fn is_pinned(&self) -> bool {
        !self.revision.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_identity_ignores_path() {
        let a = Project {
            name: "n".into(),
            remote: "r".into(),
            path: "a".into(),
            revision: String::new(),
            remote_branch: default_remote_branch(),
            gerrit_host: None,
            githooks_path: None,
            history_depth: 0,
            attributes: BTreeSet::new(),
            git_submodules: false,
            manifest_path: String::new(),
            local_config: LocalConfig::default(),
        };
        let mut b = a.clone();
        b.path = "b".into();
        assert_eq!(a.key(), b.key());
    }
}
