use serde::{Deserialize, Serialize};

fn default_remote_branch() -> String {
    "master".to_string()
}

/// A reference from one manifest to another, fetched as its own git
/// checkout (`spec.md` §3, "Import"). Resolved into a [`crate::Project`]
/// once the loader has determined its target revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@remote")]
    pub remote: String,

    /// Path, within the imported repository, of the manifest file to load.
    #[serde(rename = "@manifest")]
    pub manifest: String,

    #[serde(rename = "@revision", default, skip_serializing_if = "String::is_empty")]
    pub revision: String,

    #[serde(
        rename = "@remotebranch",
        default = "default_remote_branch",
        skip_serializing_if = "String::is_empty"
    )]
    pub remote_branch: String,

    /// Prefix prepended to every project path declared (directly or
    /// transitively) underneath this import.
    #[serde(rename = "@root", default, skip_serializing_if = "String::is_empty")]
    pub root: String,
}

/// A same-repository import that never triggers network I/O
/// (`spec.md` §3, "Local-import").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalImport {
    /// Path relative to the importing manifest file.
    #[serde(rename = "@file")]
    pub file: String,
}

/// Canonicalized remote URL used to detect two imports that refer to the
/// same remote (`spec.md` §3, "Import cache key"): trailing slashes are
/// stripped so `https://x/y` and `https://x/y/` collide.
pub fn import_cache_key(remote: &str) -> String {
    remote.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::import_cache_key;

    #[test]
    fn strips_trailing_slash() {
        assert_eq!(
            import_cache_key("https://example.com/repo/"),
            import_cache_key("https://example.com/repo")
        );
    }
}
