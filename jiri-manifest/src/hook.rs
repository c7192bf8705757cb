use serde::{Deserialize, Serialize};

/// A post-update hook bound to a named project (`spec.md` §3, "Hook";
/// §4.5 "Hook runner").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@project")]
    pub project_name: String,

    /// Script path, relative to the project's working tree.
    #[serde(rename = "@action")]
    pub action: String,

    /// Absolute path to the action script, filled in once the named
    /// project's concrete path is known. Never present in the XML.
    #[serde(skip, default)]
    pub action_path: Option<String>,
}

impl Hook {
    pub fn key(&self) -> (String, String) {
        (self.project_name.clone(), self.name.clone())
    }
}
