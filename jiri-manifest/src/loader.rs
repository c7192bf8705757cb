//! Recursive manifest loader (`spec.md` §4.3).
//!
//! The loader is generic over a [`ManifestIo`] implementation so this crate
//! stays free of any git or network dependency — the binary crate supplies
//! a `gix`-backed implementation, and tests supply an in-memory one.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::LoaderError;
use crate::hook::Hook;
use crate::import::{import_cache_key, Import, LocalImport};
use crate::lockfile::{LockSet, Lockfile, MergeMode};
use crate::manifest::Manifest;
use crate::overrides::{ImportOverride, ProjectOverride};
use crate::package::Package;
use crate::project::{Project, ProjectKey};
use crate::tree::{CycleGuard, ImportTree, ManifestFileRef};

/// Name of the lockfile the loader looks for while walking up from each
/// manifest's directory to the workspace root.
pub const LOCKFILE_NAME: &str = "jiri.lock";

/// Where a remote import's manifest repository ended up, and which
/// revision was selected (`spec.md` §4.3 step 4).
#[derive(Debug, Clone)]
pub struct ImportCheckout {
    /// `repo-path` to use in subsequent [`ManifestFileRef`]s for files read
    /// from this checkout.
    pub repo_path: String,
    pub revision: String,
}

/// Everything the loader needs from the outside world.
pub trait ManifestIo {
    type Error: std::error::Error + 'static;

    /// Reads the raw contents named by `reference`.
    fn read_file(&mut self, reference: &ManifestFileRef) -> Result<String, Self::Error>;

    /// Ensures the manifest repository behind `import` is available and
    /// returns where it landed plus the resolved target revision.
    ///
    /// `update_mode` selects between cloning into the live
    /// `<jiri-root>/<import-path>` directory and a throwaway temp
    /// directory used when just resolving a manifest (`spec.md` §4.3
    /// step 4).
    fn ensure_import(
        &mut self,
        import: &Import,
        update_mode: bool,
        local_manifest_mode: bool,
    ) -> Result<ImportCheckout, Self::Error>;

    /// Lists lockfile candidates directly inside the directory containing
    /// `manifest_ref`, without descending into subdirectories.
    fn sibling_lockfiles(
        &mut self,
        manifest_ref: &ManifestFileRef,
    ) -> Result<Vec<ManifestFileRef>, Self::Error>;

    /// Joins a directory-relative path the same way the underlying
    /// filesystem/git-tree would (lets tests and the real implementation
    /// agree on separators).
    fn join(&self, base_file: &str, relative: &str) -> String {
        match base_file.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{relative}"),
            None => relative.to_string(),
        }
    }

    /// Parent directory path, or `""` at the workspace root.
    fn parent_dir(&self, file: &str) -> Option<String> {
        file.rsplit_once('/').map(|(dir, _)| dir.to_string())
    }
}

/// Output of a successful [`load`] (`spec.md` §3, "Resolved universe").
#[derive(Debug, Clone, Default)]
pub struct ResolvedUniverse {
    pub projects: IndexMap<ProjectKey, Project>,
    pub hooks: IndexMap<(String, String), Hook>,
    pub packages: IndexMap<(String, String, String), Package>,
    pub project_locks: LockSet,
    pub tree: ImportTree,
}

struct ImportRequirement {
    parent_file: String,
    resolved_ref: String,
}

struct Loader<'a, S: ManifestIo> {
    source: &'a mut S,
    tree: ImportTree,
    cycle_guard: CycleGuard,
    projects: IndexMap<ProjectKey, Project>,
    hooks: IndexMap<(String, String), Hook>,
    packages: IndexMap<(String, String, String), Package>,
    lock_set: LockSet,
    loaded_lockfiles: BTreeSet<ManifestFileRef>,
    root_project_overrides: Vec<ProjectOverride>,
    root_import_overrides: Vec<ImportOverride>,
    import_requirements: IndexMap<String, ImportRequirement>,
    project_file_refs: IndexMap<ProjectKey, ManifestFileRef>,
    update_mode: bool,
    local_manifest_mode: bool,
}

pub fn load<S: ManifestIo>(
    source: &mut S,
    root_manifest: ManifestFileRef,
    update_mode: bool,
    local_manifest_mode: bool,
) -> Result<ResolvedUniverse, LoaderError<S::Error>> {
    let mut loader = Loader {
        source,
        tree: ImportTree::default(),
        cycle_guard: CycleGuard::default(),
        projects: IndexMap::new(),
        hooks: IndexMap::new(),
        packages: IndexMap::new(),
        lock_set: LockSet::default(),
        loaded_lockfiles: BTreeSet::new(),
        root_project_overrides: Vec::new(),
        root_import_overrides: Vec::new(),
        import_requirements: IndexMap::new(),
        project_file_refs: IndexMap::new(),
        update_mode,
        local_manifest_mode,
    };

    loader.load_node(root_manifest, None, "", None, true)?;
    loader.tree.propagate_attributes();
    loader.annotate_projects_with_attributes();

    Ok(ResolvedUniverse {
        projects: loader.projects,
        hooks: loader.hooks,
        packages: loader.packages,
        project_locks: loader.lock_set,
        tree: loader.tree,
    })
}

impl<'a, S: ManifestIo> Loader<'a, S> {
    fn load_node(
        &mut self,
        file_ref: ManifestFileRef,
        cycle_key: Option<(String, String)>,
        inherited_root: &str,
        import_revision: Option<&str>,
        is_root: bool,
    ) -> Result<(), LoaderError<S::Error>> {
        self.cycle_guard.push(file_ref.clone(), cycle_key)?;
        self.tree.register(file_ref.clone());

        let contents = self
            .source
            .read_file(&file_ref)
            .map_err(LoaderError::Source)?;
        let manifest = Manifest::parse(&contents).map_err(|source| LoaderError::ManifestParse {
            file: file_ref.to_string(),
            source,
        })?;

        if is_root {
            self.root_project_overrides = manifest.overrides.project.clone();
            self.root_import_overrides = manifest.overrides.import.clone();
        } else if !manifest.overrides.project.is_empty() || !manifest.overrides.import.is_empty() {
            return Err(LoaderError::NonRootOverride {
                file: file_ref.to_string(),
            });
        }

        self.merge_lockfiles(&file_ref)?;

        for localimport in &manifest.imports.localimport {
            self.load_localimport(localimport, &file_ref, inherited_root, import_revision)?;
        }

        for import in &manifest.imports.import {
            self.load_import(import, &file_ref, inherited_root)?;
        }

        for project in &manifest.projects.project {
            self.register_project(project, &file_ref, inherited_root, import_revision)?;
        }

        for hook in &manifest.hooks.hook {
            let mut hook = hook.clone();
            if hook.action_path.is_none() {
                if let Some(project) = self.project_by_name(&hook.project_name) {
                    hook.action_path = Some(format!("{}/{}", project.path, hook.action));
                }
            }
            self.hooks.insert(hook.key(), hook);
        }

        for package in &manifest.packages.package {
            let mut package = package.clone();
            package.manifest_path = file_ref.to_string();
            self.packages.insert(package.key(), package);
        }

        self.cycle_guard.pop();
        Ok(())
    }

    fn load_localimport(
        &mut self,
        localimport: &LocalImport,
        parent_ref: &ManifestFileRef,
        inherited_root: &str,
        import_revision: Option<&str>,
    ) -> Result<(), LoaderError<S::Error>> {
        let joined = self.source.join(&parent_ref.file, &localimport.file);
        let child_ref = ManifestFileRef {
            repo_path: parent_ref.repo_path.clone(),
            file: joined,
            git_ref: parent_ref.git_ref.clone(),
        };
        self.tree.add_child(parent_ref, child_ref.clone());
        self.load_node(child_ref, None, inherited_root, import_revision, false)
    }

    fn load_import(
        &mut self,
        import: &Import,
        parent_ref: &ManifestFileRef,
        inherited_root: &str,
    ) -> Result<(), LoaderError<S::Error>> {
        let mut import = import.clone();
        for o in &self.root_import_overrides {
            if o.key() == ProjectKey::new(import.name.clone(), import.remote.clone()) {
                o.apply(&mut import);
            }
        }

        let cache_key = import_cache_key(&import.remote);
        let requirement = ImportRequirement {
            parent_file: parent_ref.to_string(),
            resolved_ref: format!("{}|{}", import.revision, import.manifest),
        };
        if let Some(existing) = self.import_requirements.get(&cache_key) {
            if existing.resolved_ref != requirement.resolved_ref {
                return Err(LoaderError::ImportConflict {
                    name: import.name.clone(),
                    parent_a: existing.parent_file.clone(),
                    ref_a: existing.resolved_ref.clone(),
                    parent_b: requirement.parent_file.clone(),
                    ref_b: requirement.resolved_ref.clone(),
                });
            }
        } else {
            self.import_requirements.insert(cache_key, requirement);
        }

        let checkout = self
            .source
            .ensure_import(&import, self.update_mode, self.local_manifest_mode)
            .map_err(LoaderError::Source)?;

        let new_root = if import.root.is_empty() {
            inherited_root.to_string()
        } else if inherited_root.is_empty() {
            import.root.clone()
        } else {
            format!("{inherited_root}/{}", import.root)
        };

        let child_ref = ManifestFileRef::remote(
            checkout.repo_path.clone(),
            import.manifest.clone(),
            checkout.revision.clone(),
        );
        self.tree.add_child(parent_ref, child_ref.clone());

        let cycle_key = Some((import_cache_key(&import.remote), import.manifest.clone()));
        self.load_node(
            child_ref,
            cycle_key,
            &new_root,
            Some(checkout.revision.as_str()),
            false,
        )
    }

    fn register_project(
        &mut self,
        project: &Project,
        file_ref: &ManifestFileRef,
        inherited_root: &str,
        import_revision: Option<&str>,
    ) -> Result<(), LoaderError<S::Error>> {
        let mut project = project.clone();
        project.manifest_path = file_ref.to_string();
        project.path = if inherited_root.is_empty() {
            project.path.clone()
        } else {
            format!("{inherited_root}/{}", project.path)
        };

        if project.revision.is_empty() {
            if let Some(rev) = import_revision {
                project.revision = rev.to_string();
            }
        }

        if let Some(locked) = self.lock_set.revision_for(&project.key()) {
            project.revision = locked.to_string();
        }

        for o in &self.root_project_overrides {
            if o.key() == project.key() {
                o.apply(&mut project);
            }
        }

        let key = project.key();
        if let Some(existing) = self.projects.get(&key) {
            if existing.path != project.path || existing.revision != project.revision {
                return Err(LoaderError::DuplicateProject {
                    name: key.name,
                    remote: key.remote,
                });
            }
        }
        self.project_file_refs.insert(key.clone(), file_ref.clone());
        self.projects.insert(key, project);
        Ok(())
    }

    fn merge_lockfiles(&mut self, file_ref: &ManifestFileRef) -> Result<(), LoaderError<S::Error>> {
        let mode = if self.local_manifest_mode {
            MergeMode::IgnorePackageLockConflicts
        } else {
            MergeMode::Strict
        };

        let mut cursor = Some(file_ref.clone());
        while let Some(dir_ref) = cursor {
            let candidates = self
                .source
                .sibling_lockfiles(&dir_ref)
                .map_err(LoaderError::Source)?;
            for candidate in candidates {
                if self.loaded_lockfiles.contains(&candidate) {
                    continue;
                }
                self.loaded_lockfiles.insert(candidate.clone());
                let contents = self
                    .source
                    .read_file(&candidate)
                    .map_err(LoaderError::Source)?;
                let Ok(lockfile) = serde_json::from_str::<Lockfile>(&contents) else {
                    continue;
                };
                self.lock_set.merge(&lockfile, mode)?;
            }

            cursor = self
                .source
                .parent_dir(&dir_ref.file)
                .map(|parent| ManifestFileRef {
                    repo_path: dir_ref.repo_path.clone(),
                    file: parent,
                    git_ref: dir_ref.git_ref.clone(),
                });
        }
        Ok(())
    }

    fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.values().find(|p| p.name == name)
    }

    fn annotate_projects_with_attributes(&mut self) {
        for (key, project) in self.projects.iter_mut() {
            let Some(file_ref) = self.project_file_refs.get(key) else {
                continue;
            };
            let attrs = self.tree.attributes_of(file_ref);
            project.attributes.extend(attrs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;

    #[derive(Default)]
    struct FakeSource {
        files: HashMap<String, String>,
    }

    impl ManifestIo for FakeSource {
        type Error = Infallible;

        fn read_file(&mut self, reference: &ManifestFileRef) -> Result<String, Self::Error> {
            Ok(self.files.get(&reference.file).cloned().unwrap_or_default())
        }

        fn ensure_import(
            &mut self,
            _import: &Import,
            _update_mode: bool,
            _local_manifest_mode: bool,
        ) -> Result<ImportCheckout, Self::Error> {
            unreachable!("this test suite only exercises local imports")
        }

        fn sibling_lockfiles(
            &mut self,
            _manifest_ref: &ManifestFileRef,
        ) -> Result<Vec<ManifestFileRef>, Self::Error> {
            Ok(vec![])
        }
    }

    #[test]
    fn loads_projects_and_localimports_deterministically() {
        let mut source = FakeSource::default();
        source.files.insert(
            "default.xml".into(),
            r#"<manifest>
                <imports><localimport file="extra.xml"/></imports>
                <projects><project name="a" path="a" remote="https://e/a" revision="r1"/></projects>
            </manifest>"#
                .into(),
        );
        source.files.insert(
            "extra.xml".into(),
            r#"<manifest>
                <projects><project name="b" path="b" remote="https://e/b"/></projects>
            </manifest>"#
                .into(),
        );

        let universe = load(&mut source, ManifestFileRef::local("default.xml"), true, false).unwrap();
        assert_eq!(universe.projects.len(), 2);
        let keys: Vec<_> = universe.projects.keys().map(|k| k.name.clone()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn rejects_overrides_in_non_root_manifest() {
        let mut source = FakeSource::default();
        source.files.insert(
            "default.xml".into(),
            r#"<manifest><imports><localimport file="extra.xml"/></imports></manifest>"#.into(),
        );
        source.files.insert(
            "extra.xml".into(),
            r#"<manifest><overrides><project name="a" remote="https://e/a" path="x"/></overrides></manifest>"#
                .into(),
        );

        let err = load(&mut source, ManifestFileRef::local("default.xml"), true, false).unwrap_err();
        assert!(matches!(err, LoaderError::NonRootOverride { .. }));
    }

    #[test]
    fn detects_localimport_cycle() {
        let mut source = FakeSource::default();
        source.files.insert(
            "default.xml".into(),
            r#"<manifest><imports><localimport file="a.xml"/></imports></manifest>"#.into(),
        );
        source.files.insert(
            "a.xml".into(),
            r#"<manifest><imports><localimport file="default.xml"/></imports></manifest>"#.into(),
        );

        let err = load(&mut source, ManifestFileRef::local("default.xml"), true, false).unwrap_err();
        assert!(matches!(err, LoaderError::Cycle(_)));
    }
}
