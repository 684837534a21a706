//! Workspace and platform discovery: finding workflow files under
//! `.github/workflows/**` and composite-action files (`action.yml`/
//! `action.yaml`) anywhere under the platform root, plus the optional
//! PR-only diff-range restriction.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use tracing::{info, warn};

/// Discovers every `.yml`/`.yaml` file directly under
/// `<workspace_root>/.github/workflows/`.
pub fn discover_workflows(workspace_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let dir = workspace_root.join(".github").join("workflows");
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkBuilder::new(&dir).max_depth(Some(1)).build() {
        let Ok(entry) = entry else { continue };
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            continue;
        };
        if path.is_file()
            && matches!(path.extension(), Some("yml") | Some("yaml"))
        {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    found
}

/// Discovers every `action.yml`/`action.yaml` file anywhere under
/// `platform_root`, honoring `.gitignore` files along the way.
pub fn discover_composite_actions(platform_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut found = Vec::new();
    for entry in WalkBuilder::new(platform_root).build() {
        let Ok(entry) = entry else { continue };
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            continue;
        };
        if path.is_file()
            && matches!(path.file_name(), Some("action.yml") | Some("action.yaml"))
        {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    found
}

/// Resolves the set of paths changed between `base` and `head` via a
/// shallow, on-demand `git diff`. Returns `None` (triggering the §4.1
/// full-scan downgrade) when the commits cannot be resolved.
pub fn pr_diff_paths(workspace_root: &Utf8Path, base: &str, head: &str) -> Option<Vec<Utf8PathBuf>> {
    let fetch = Command::new("git")
        .args(["fetch", "--depth", "1", "origin", base, head])
        .current_dir(workspace_root)
        .output();
    if let Ok(output) = &fetch {
        if !output.status.success() {
            warn!("PR-only mode: shallow fetch of {base}..{head} failed");
        }
    }

    let diff = Command::new("git")
        .args(["diff", "--name-only", &format!("{base}..{head}")])
        .current_dir(workspace_root)
        .output()
        .ok()?;

    if !diff.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&diff.stdout);
    let paths = text
        .lines()
        .filter(|l| !l.is_empty())
        .map(Utf8PathBuf::from)
        .collect::<Vec<_>>();

    if paths.is_empty() {
        info!("PR-only mode: {base}..{head} touched no files");
    }

    Some(paths)
}

/// Restricts `files` to those whose workspace-relative path appears in
/// `changed`.
pub fn filter_by_diff(
    workspace_root: &Utf8Path,
    files: Vec<Utf8PathBuf>,
    changed: &[Utf8PathBuf],
) -> Vec<Utf8PathBuf> {
    files
        .into_iter()
        .filter(|f| {
            let rel = f.strip_prefix(workspace_root).unwrap_or(f);
            changed.iter().any(|c| c == rel || c == f)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_workflow_files_only_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let workflows = root.join(".github").join("workflows");
        fs::create_dir_all(&workflows).unwrap();
        fs::write(workflows.join("ci.yml"), "on: push\n").unwrap();
        fs::write(workflows.join("notes.txt"), "hi\n").unwrap();
        fs::create_dir_all(workflows.join("nested")).unwrap();
        fs::write(workflows.join("nested").join("deep.yml"), "on: push\n").unwrap();

        let found = discover_workflows(root);
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("ci.yml"));
    }

    #[test]
    fn discovers_composite_actions_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let action_dir = root.join("configs").join("ci").join("actions").join("foo");
        fs::create_dir_all(&action_dir).unwrap();
        fs::write(action_dir.join("action.yml"), "runs:\n  using: composite\n").unwrap();

        let found = discover_composite_actions(root);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn missing_workflows_dir_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        assert!(discover_workflows(root).is_empty());
    }
}
