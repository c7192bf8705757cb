use serde::{Deserialize, Serialize};

use crate::hook::Hook;
use crate::import::{Import, LocalImport};
use crate::overrides::{ImportOverride, ProjectOverride};
use crate::package::Package;
use crate::project::Project;

/// `<imports>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imports {
    #[serde(rename = "import", default)]
    pub import: Vec<Import>,
    #[serde(rename = "localimport", default)]
    pub localimport: Vec<LocalImport>,
}

/// `<overrides>`. Only legal in the root manifest; see
/// `spec.md` §4.3 "Override resolution".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(rename = "project", default)]
    pub project: Vec<ProjectOverride>,
    #[serde(rename = "import", default)]
    pub import: Vec<ImportOverride>,
}

/// `<projects>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Projects {
    #[serde(rename = "project", default)]
    pub project: Vec<Project>,
}

/// `<hooks>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(rename = "hook", default)]
    pub hook: Vec<Hook>,
}

/// `<packages>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Packages {
    #[serde(rename = "package", default)]
    pub package: Vec<Package>,
}

/// The root XML document (`spec.md` §6, "Manifest XML schema").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "manifest")]
pub struct Manifest {
    #[serde(default)]
    pub imports: Imports,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub projects: Projects,
    #[serde(default)]
    pub hooks: Hooks,
    #[serde(default)]
    pub packages: Packages,
}

impl Manifest {
    pub fn parse(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    pub fn to_xml(&self) -> Result<String, quick_xml::DeError> {
        let mut buf = String::new();
        buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        buf.push_str(&quick_xml::se::to_string(self)?);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <manifest>
          <imports>
            <import remote="https://example.com/sub" manifest="manifest" name="sub"/>
            <localimport file="local.xml"/>
          </imports>
          <overrides>
            <project name="foo" remote="https://example.com/foo" path="vendor/foo"/>
          </overrides>
          <projects>
            <project name="foo" path="foo" remote="https://example.com/foo" revision="abc123"/>
          </projects>
          <hooks>
            <hook name="post" project="foo" action="scripts/post.sh"/>
          </hooks>
          <packages>
            <package name="tool" version="git_revision:abc" path="tools/${platform}"/>
          </packages>
        </manifest>
    "#;

    #[test]
    fn parses_full_schema() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.imports.import.len(), 1);
        assert_eq!(manifest.imports.localimport.len(), 1);
        assert_eq!(manifest.overrides.project.len(), 1);
        assert_eq!(manifest.projects.project[0].revision, "abc123");
        assert_eq!(manifest.hooks.hook[0].project_name, "foo");
        assert_eq!(manifest.packages.package[0].name, "tool");
    }

    #[test]
    fn parsed_schema_snapshot() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        insta::assert_debug_snapshot!(manifest);
    }
}
