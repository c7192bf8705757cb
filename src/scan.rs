//! Local project scan: the update engine's other input besides the
//! resolved manifest (`spec.md` §4.4, "Input: local project scan...").
//!
//! Rather than walking the filesystem and guessing project identity back
//! out of `.git/config` on every invocation, the index written by the
//! previous successful update is trusted and persisted at
//! `<jiri-root>/.jiri_root/project_index.json`. A workspace with no index
//! yet (first `update`) is scanned as empty, so every resolved project is
//! classified `create`.

use indexmap::IndexMap;
use jiri_manifest::{Project, ProjectKey};

use crate::context::{WorkspaceContext, METADATA_DIR};

const INDEX_FILE: &str = "project_index.json";

// `ProjectKey` isn't a string, so it can't be a JSON object key directly;
// the index round-trips through a plain pair list instead.
pub fn load(ctx: &WorkspaceContext) -> IndexMap<ProjectKey, String> {
    let path = ctx.root.join(METADATA_DIR).join(INDEX_FILE);
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str::<Vec<(ProjectKey, String)>>(&contents).ok())
        .map(IndexMap::from_iter)
        .unwrap_or_default()
}

pub fn save(ctx: &WorkspaceContext, index: &IndexMap<ProjectKey, String>) -> std::io::Result<()> {
    let dir = ctx.root.join(METADATA_DIR);
    std::fs::create_dir_all(&dir)?;
    let pairs: Vec<(&ProjectKey, &String)> = index.iter().collect();
    let serialized = serde_json::to_string_pretty(&pairs).expect("project index serialization cannot fail");
    std::fs::write(dir.join(INDEX_FILE), serialized)
}

/// Rebuilds the index from a resolved universe after a successful update,
/// so the next run's scan reflects wherever projects actually landed.
pub fn rebuild_from_universe(universe: &jiri_manifest::loader::ResolvedUniverse) -> IndexMap<ProjectKey, String> {
    rebuild_from_projects(&universe.projects)
}

/// Same as [`rebuild_from_universe`], for callers (e.g. `snapshot -checkout`)
/// that only have a flat project map rather than a full resolved universe.
pub fn rebuild_from_projects(projects: &IndexMap<ProjectKey, Project>) -> IndexMap<ProjectKey, String> {
    projects
        .iter()
        .map(|(key, project)| (key.clone(), project.path.clone()))
        .collect()
}
