//! `jiri grep`: parallel pattern search across every project (`spec.md`
//! §4.5/§4.6 component table).

use jiri_manifest::Project;
use regex::Regex;

use crate::context::WorkspaceContext;

#[derive(Debug, Clone)]
pub struct GrepMatch {
    pub project: String,
    pub file: String,
    pub line_number: usize,
    pub line: String,
}

/// Walks tracked working-tree files under each project and reports every
/// line matching `pattern`. Runs sequentially per project but the caller
/// typically drives this over projects in parallel via
/// [`crate::parallel::run_over_projects`].
pub fn grep_project(ctx: &WorkspaceContext, project: &Project, pattern: &Regex) -> std::io::Result<Vec<GrepMatch>> {
    let root = ctx.project_path(&project.path);
    let mut matches = Vec::new();
    walk(&root, &root, project, pattern, &mut matches)?;
    Ok(matches)
}

fn walk(
    root: &std::path::Path,
    dir: &std::path::Path,
    project: &Project,
    pattern: &Regex,
    matches: &mut Vec<GrepMatch>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            walk(root, &path, project, pattern, matches)?;
        } else if file_type.is_file() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                let relative = path.strip_prefix(root).unwrap_or(&path).display().to_string();
                for (idx, line) in contents.lines().enumerate() {
                    if pattern.is_match(line) {
                        matches.push(GrepMatch {
                            project: project.name.clone(),
                            file: relative.clone(),
                            line_number: idx + 1,
                            line: line.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}
