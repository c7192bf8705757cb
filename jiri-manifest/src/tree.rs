//! The import graph as a DAG with shared descendants.
//!
//! Nodes are owned by a pool keyed on [`ManifestFileRef`]; parents link to
//! children by key rather than by reference, so the same manifest file
//! reachable through two import paths is loaded (and attributed) once.
//! Cycle detection uses a separate path-stack rather than the node set
//! itself, since a DAG of *files* can still contain a cycle of *imports*
//! being actively processed (`spec.md` §9, "Cyclic ownership").

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Identifies the exact blob a manifest file was read from
/// (`spec.md` §3, "Manifest-file reference"). `repo_path == ""` means a
/// plain filesystem path; otherwise `file` names a path inside the git
/// object at `git_ref` within the repository checked out at `repo_path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestFileRef {
    pub repo_path: String,
    pub file: String,
    pub git_ref: String,
}

impl ManifestFileRef {
    pub fn local(file: impl Into<String>) -> Self {
        Self {
            repo_path: String::new(),
            file: file.into(),
            git_ref: String::new(),
        }
    }

    pub fn remote(repo_path: impl Into<String>, file: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            file: file.into(),
            git_ref: git_ref.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.repo_path.is_empty()
    }

    /// The attribute tag this file contributes: directory + base name,
    /// matching `spec.md` §3's "Import tree node" wording.
    pub fn attribute_tag(&self) -> String {
        self.file.trim_start_matches("./").to_string()
    }
}

impl fmt::Display for ManifestFileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}@{}:{}", self.repo_path, self.git_ref, self.file)
        }
    }
}

/// A node in the import DAG: the file itself, plus the propagated
/// attribute set and the keys of its direct children.
#[derive(Debug, Clone, Default)]
pub struct ImportTreeNode {
    pub attributes: BTreeSet<String>,
    pub children: Vec<ManifestFileRef>,
}

/// Owns every node discovered while loading a manifest graph.
#[derive(Debug, Clone, Default)]
pub struct ImportTree {
    pub nodes: IndexMap<ManifestFileRef, ImportTreeNode>,
    pub root: Option<ManifestFileRef>,
}

impl ImportTree {
    pub fn register(&mut self, key: ManifestFileRef) {
        if self.root.is_none() {
            self.root = Some(key.clone());
        }
        self.nodes.entry(key).or_default();
    }

    pub fn add_child(&mut self, parent: &ManifestFileRef, child: ManifestFileRef) {
        if let Some(node) = self.nodes.get_mut(parent) {
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
    }

    /// Unions each node's own attribute tag with every ancestor's
    /// attributes, from root to leaves (`spec.md` §4.3, "Attribute
    /// propagation").
    pub fn propagate_attributes(&mut self) {
        let Some(root) = self.root.clone() else {
            return;
        };
        let mut stack = vec![(root, BTreeSet::new())];
        let mut visited = BTreeSet::new();
        while let Some((key, inherited)) = stack.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            let own_tag = key.attribute_tag();
            let children = {
                let node = self.nodes.entry(key.clone()).or_default();
                node.attributes = inherited.clone();
                node.attributes.insert(own_tag);
                node.children.clone()
            };
            let next_inherited = self.nodes[&key].attributes.clone();
            for child in children {
                stack.push((child, next_inherited.clone()));
            }
        }
    }

    pub fn attributes_of(&self, key: &ManifestFileRef) -> BTreeSet<String> {
        self.nodes.get(key).map(|n| n.attributes.clone()).unwrap_or_default()
    }
}

/// Key distinguishing import cycles that revisit the same remote manifest
/// even via a different file path alias.
pub type CycleKey = Option<(String, String)>;

#[derive(Debug, Error)]
#[error("import cycle detected: {}", stack.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
pub struct ImportCycle {
    pub stack: Vec<ManifestFileRef>,
}

/// Tracks manifest files currently being descended into, so the loader can
/// detect both file-path cycles and remote-manifest cycles reached via a
/// different alias (`spec.md` §4.3, "Cycle detection").
#[derive(Debug, Default)]
pub struct CycleGuard {
    stack: Vec<(ManifestFileRef, CycleKey)>,
}

impl CycleGuard {
    pub fn push(&mut self, file: ManifestFileRef, cycle_key: CycleKey) -> Result<(), ImportCycle> {
        let hits_path = self.stack.iter().any(|(f, _)| f == &file);
        let hits_key = cycle_key
            .as_ref()
            .is_some_and(|k| self.stack.iter().any(|(_, ck)| ck.as_ref() == Some(k)));
        if hits_path || hits_key {
            let mut stack: Vec<_> = self.stack.iter().map(|(f, _)| f.clone()).collect();
            stack.push(file);
            return Err(ImportCycle { stack });
        }
        self.stack.push((file, cycle_key));
        Ok(())
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_file_path_cycle() {
        let mut guard = CycleGuard::default();
        guard.push(ManifestFileRef::local("a.xml"), None).unwrap();
        guard.push(ManifestFileRef::local("b.xml"), None).unwrap();
        let err = guard.push(ManifestFileRef::local("a.xml"), None).unwrap_err();
        assert_eq!(err.stack.len(), 3);
    }

    #[test]
    fn detects_remote_key_cycle_via_different_alias() {
        let mut guard = CycleGuard::default();
        guard
            .push(
                ManifestFileRef::remote("/ws/sub", "manifest", "HEAD"),
                Some(("https://example.com/sub".into(), "manifest".into())),
            )
            .unwrap();
        let err = guard
            .push(
                ManifestFileRef::remote("/ws/sub-alias", "manifest", "HEAD"),
                Some(("https://example.com/sub".into(), "manifest".into())),
            )
            .unwrap_err();
        assert_eq!(err.stack.len(), 2);
    }

    #[test]
    fn attribute_propagation_unions_root_to_leaf() {
        let mut tree = ImportTree::default();
        let root = ManifestFileRef::local("default.xml");
        let child = ManifestFileRef::local("sub/extra.xml");
        tree.register(root.clone());
        tree.register(child.clone());
        tree.add_child(&root, child.clone());
        tree.propagate_attributes();
        let child_attrs = tree.attributes_of(&child);
        assert!(child_attrs.contains("default.xml"));
        assert!(child_attrs.contains("sub/extra.xml"));
    }
}
