use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::csv_set;

/// A versioned binary artifact fetched into a template-resolved path
/// (`spec.md` §3, "Package"; §4.5 "Package fetcher").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@version")]
    pub version: String,

    /// May contain `${platform}`, `${os}` and `${arch}` placeholders
    /// expanded by the package fetcher.
    #[serde(rename = "@path")]
    pub path_template: String,

    #[serde(rename = "@attributes", default, with = "csv_set")]
    pub attributes: BTreeSet<String>,

    /// Platforms this package applies to (`linux-amd64`, `darwin-arm64`,
    /// ...); empty means all platforms.
    #[serde(rename = "@platforms", default, with = "csv_set")]
    pub platforms: BTreeSet<String>,

    #[serde(skip, default)]
    pub manifest_path: String,
}

impl Package {
    pub fn key(&self) -> (String, String, String) {
        (self.name.clone(), self.version.clone(), self.path_template.clone())
    }

    pub fn applies_to_platform(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.contains(platform)
    }
}

/// Expands `${os}`/`${arch}`/`${platform}` placeholders in a package's
/// `path-template` attribute.
pub fn expand_path_template(template: &str, os: &str, arch: &str) -> String {
    template
        .replace("${platform}", &format!("{os}-{arch}"))
        .replace("${os}", os)
        .replace("${arch}", arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_platform_variables() {
        let out = expand_path_template("tools/${name}/${platform}", "linux", "amd64");
        assert_eq!(out, "tools/${name}/linux-amd64");
    }

    #[test]
    fn empty_platforms_means_universal() {
        let pkg = Package {
            name: "n".into(),
            version: "v".into(),
            path_template: "p".into(),
            attributes: BTreeSet::new(),
            platforms: BTreeSet::new(),
            manifest_path: String::new(),
        };
        assert!(pkg.applies_to_platform("linux-amd64"));
    }
}
