use serde::{Deserialize, Serialize};

use crate::import::Import;
use crate::project::{Project, ProjectKey};

/// Replaces fields of any downstream [`Project`] declaration matching
/// `(name, remote)` (`spec.md` §3, "Override"; §4.3 "Override resolution").
///
/// Only legal in the top-level manifest; the loader rejects overrides found
/// while processing any imported manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectOverride {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@remote")]
    pub remote: String,

    #[serde(rename = "@path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(rename = "@revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(rename = "@gerrithost", default, skip_serializing_if = "Option::is_none")]
    pub gerrit_host: Option<String>,

    #[serde(rename = "@remotebranch", default, skip_serializing_if = "Option::is_none")]
    pub remote_branch: Option<String>,
}

impl ProjectOverride {
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.name.clone(), self.remote.clone())
    }

    /// Replaces the matching fields of `project`. Overrides take precedence
    /// over any lockfile-driven revision pin, so callers must apply this
    /// after lockfile merge, not before.
    pub fn apply(&self, project: &mut Project) {
        if let Some(path) = &self.path {
            project.path = path.clone();
        }
        if let Some(revision) = &self.revision {
            project.revision = revision.clone();
        }
        if let Some(gerrit_host) = &self.gerrit_host {
            project.gerrit_host = Some(gerrit_host.clone());
        }
        if let Some(remote_branch) = &self.remote_branch {
            project.remote_branch = remote_branch.clone();
        }
    }
}

/// The import-side equivalent of [`ProjectOverride`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOverride {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@remote")]
    pub remote: String,

    #[serde(rename = "@revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(rename = "@remotebranch", default, skip_serializing_if = "Option::is_none")]
    pub remote_branch: Option<String>,

    #[serde(rename = "@manifest", default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

impl ImportOverride {
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.name.clone(), self.remote.clone())
    }

    pub fn apply(&self, import: &mut Import) {
        if let Some(revision) = &self.revision {
            import.revision = revision.clone();
        }
        if let Some(remote_branch) = &self.remote_branch {
            import.remote_branch = remote_branch.clone();
        }
        if let Some(manifest) = &self.manifest {
            import.manifest = manifest.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample_project() -> Project {
        Project {
            name: "p".into(),
            remote: "r".into(),
            path: "orig".into(),
            revision: String::new(),
            remote_branch: "master".into(),
            gerrit_host: None,
            githooks_path: None,
            history_depth: 0,
            attributes: BTreeSet::new(),
            git_submodules: false,
            manifest_path: String::new(),
            local_config: Default::default(),
        }
    }

    #[test]
    fn override_replaces_only_set_fields() {
        let project_override = ProjectOverride {
            name: "p".into(),
            remote: "r".into(),
            path: Some("new-path".into()),
            revision: None,
            gerrit_host: None,
            remote_branch: None,
        };
        let mut project = sample_project();
        project_override.apply(&mut project);
        assert_eq!(project.path, "new-path");
        assert_eq!(project.remote_branch, "master");
    }
}
