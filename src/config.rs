//! Workspace-level configuration persisted at `<root>/.jiri_root/config`
//! (`spec.md` ambient stack / §6 "Environment"). Distinct from
//! `jiri_manifest::LocalConfig`, which is per-project.

use serde::{Deserialize, Serialize};

use crate::context::WorkspaceContext;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub gerrit_host: Option<String>,
    #[serde(default)]
    pub manifest_url: String,
    #[serde(default)]
    pub manifest_name: String,
    #[serde(default = "default_branch")]
    pub manifest_branch: String,
    #[serde(default)]
    pub local_manifest_mode: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

impl WorkspaceConfig {
    pub fn load(ctx: &WorkspaceContext) -> std::io::Result<Self> {
        let path = ctx.root.join(crate::context::METADATA_DIR).join("config");
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                Ok(toml::from_str(&contents).unwrap_or_default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, ctx: &WorkspaceContext) -> std::io::Result<()> {
        let dir = ctx.root.join(crate::context::METADATA_DIR);
        std::fs::create_dir_all(&dir)?;
        let serialized = toml::to_string_pretty(self).unwrap_or_default();
        std::fs::write(dir.join("config"), serialized)
    }
}
