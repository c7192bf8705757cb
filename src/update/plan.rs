//! Operation classification for one update pass (`spec.md` §4.4,
//! "Operation classification").

use indexmap::IndexMap;
use jiri_manifest::{Project, ProjectKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
    Move { old_path: String },
    Update,
    Nullop,
}

#[derive(Debug, Clone)]
pub struct PlannedProject {
    pub key: ProjectKey,
    pub project: Option<Project>,
    pub local_path: Option<String>,
    pub op: Operation,
}

/// One entry per project key present in the local scan, the resolved
/// universe, or both.
pub fn classify(
    local: &IndexMap<ProjectKey, String>,
    universe: &IndexMap<ProjectKey, Project>,
    gc: bool,
) -> Vec<PlannedProject> {
    let mut planned = Vec::new();

    for (key, project) in universe {
        match local.get(key) {
            None => planned.push(PlannedProject {
                key: key.clone(),
                project: Some(project.clone()),
                local_path: None,
                op: Operation::Create,
            }),
            Some(local_path) if local_path != &project.path => planned.push(PlannedProject {
                key: key.clone(),
                project: Some(project.clone()),
                local_path: Some(local_path.clone()),
                op: Operation::Move {
                    old_path: local_path.clone(),
                },
            }),
            Some(_) => planned.push(PlannedProject {
                key: key.clone(),
                project: Some(project.clone()),
                local_path: local.get(key).cloned(),
                op: Operation::Update,
            }),
        }
    }

    for (key, local_path) in local {
        if !universe.contains_key(key) {
            planned.push(PlannedProject {
                key: key.clone(),
                project: None,
                local_path: Some(local_path.clone()),
                op: if gc { Operation::Delete } else { Operation::Nullop },
            });
        }
    }

    planned
}

/// Splits a plan so delete/move operations run before creates that would
/// reuse a freed path (`spec.md` §4.4, "Ordering invariants").
pub fn ordering_levels(planned: Vec<PlannedProject>) -> Vec<Vec<PlannedProject>> {
    let mut deletes_and_moves = Vec::new();
    let mut rest = Vec::new();
    for p in planned {
        match p.op {
            Operation::Delete | Operation::Move { .. } => deletes_and_moves.push(p),
            _ => rest.push(p),
        }
    }
    let mut levels = Vec::new();
    if !deletes_and_moves.is_empty() {
        levels.push(deletes_and_moves);
    }
    if !rest.is_empty() {
        levels.push(rest);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn project(name: &str, path: &str) -> Project {
        Project {
            name: name.into(),
            remote: "https://example.com/x".into(),
            path: path.into(),
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
    fn classifies_create_update_move_delete() {
        let mut universe = IndexMap::new();
        universe.insert(ProjectKey::new("a", "r"), project("a", "a"));
        universe.insert(ProjectKey::new("b", "r"), project("b", "b-new"));
        universe.insert(ProjectKey::new("c", "r"), project("c", "c"));

        let mut local = IndexMap::new();
        local.insert(ProjectKey::new("b", "r"), "b-old".to_string());
        local.insert(ProjectKey::new("c", "r"), "c".to_string());
        local.insert(ProjectKey::new("d", "r"), "d".to_string());

        let planned = classify(&local, &universe, true);
        let ops: IndexMap<_, _> = planned.iter().map(|p| (p.key.name.clone(), p.op.clone())).collect();

        assert_eq!(ops["a"], Operation::Create);
        assert_eq!(ops["b"], Operation::Move { old_path: "b-old".into() });
        assert_eq!(ops["c"], Operation::Update);
        assert_eq!(ops["d"], Operation::Delete);
    }

    #[test]
    fn delete_without_gc_is_nullop() {
        let universe = IndexMap::new();
        let mut local = IndexMap::new();
        local.insert(ProjectKey::new("d", "r"), "d".to_string());
        let planned = classify(&local, &universe, false);
        assert_eq!(planned[0].op, Operation::Nullop);
    }
}
