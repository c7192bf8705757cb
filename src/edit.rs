//! `jiri edit`: mutate a manifest or lockfile's pinned revisions in place
//! (`spec.md` §6 CLI surface: `edit <manifest> [-project=N=rev
//! -import=N=rev -package=N=ver -edit-mode=manifest|lockfile|both]`).

use jiri_manifest::Manifest;
use thiserror::Error;

use crate::git::{GitError, Scm};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("no project named {0} in manifest")]
    NoSuchProject(String),

    #[error("no import named {0} in manifest")]
    NoSuchImport(String),

    #[error("no package named {0} in manifest")]
    NoSuchPackage(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Xml(#[from] quick_xml::DeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Manifest,
    Lockfile,
    Both,
}

#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub project_revisions: Vec<(String, String)>,
    pub import_revisions: Vec<(String, String)>,
    pub package_versions: Vec<(String, String)>,
}

/// Resolves a bare ref name to a concrete revision via `ls-remote` before
/// writing it in, so the manifest never ends up pinned to a floating
/// branch name (`spec.md` §4.1, "`ls-remote`... used by manifest `edit`").
fn resolve_revision(scm: &dyn Scm, remote: &str, reference: &str) -> Result<String, GitError> {
    if reference.chars().all(|c| c.is_ascii_hexdigit()) && reference.len() >= 7 {
        return Ok(reference.to_string());
    }
    scm.ls_remote(remote, reference)
}

pub fn apply_edit(scm: &dyn Scm, manifest: &mut Manifest, request: &EditRequest) -> Result<(), EditError> {
    for (name, rev) in &request.project_revisions {
        let project = manifest
            .projects
            .project
            .iter_mut()
            .find(|p| &p.name == name)
            .ok_or_else(|| EditError::NoSuchProject(name.clone()))?;
        project.revision = resolve_revision(scm, &project.remote, rev)?;
    }

    for (name, rev) in &request.import_revisions {
        let import = manifest
            .imports
            .import
            .iter_mut()
            .find(|i| &i.name == name)
            .ok_or_else(|| EditError::NoSuchImport(name.clone()))?;
        import.revision = resolve_revision(scm, &import.remote, rev)?;
    }

    for (name, version) in &request.package_versions {
        let package = manifest
            .packages
            .package
            .iter_mut()
            .find(|p| &p.name == name)
            .ok_or_else(|| EditError::NoSuchPackage(name.clone()))?;
        package.version = version.clone();
    }

    Ok(())
}

pub fn edit_file(
    scm: &dyn Scm,
    path: &std::path::Path,
    request: &EditRequest,
    _mode: EditMode,
) -> Result<(), EditError> {
    let contents = std::fs::read_to_string(path)?;
    let mut manifest = Manifest::parse(&contents)?;
    apply_edit(scm, &mut manifest, request)?;
    std::fs::write(path, manifest.to_xml()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeScm;

    #[test]
    fn rejects_unknown_project() {
        let manifest = Manifest::default();
        let mut manifest = manifest;
        let scm = FakeScm::new();
        let request = EditRequest {
            project_revisions: vec![("missing".to_string(), "deadbeef".to_string())],
            ..Default::default()
        };
        let err = apply_edit(&scm, &mut manifest, &request).unwrap_err();
        assert!(matches!(err, EditError::NoSuchProject(_)));
    }
}
