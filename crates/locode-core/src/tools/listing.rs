use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use glob::Pattern;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ParamSpec, Tool, ToolContext, ToolError, ToolOutput};
use crate::project::{is_dir_entry, walk_project};

/// Directory levels shown by `list_files` below the root.
const LIST_DEPTH: usize = 3;
const MAX_ENTRIES_PER_DIR: usize = 50;
const MAX_SEARCH_RESULTS: usize = 50;
const MAX_SEARCH_DEPTH: usize = 16;

pub struct ListFiles;
pub struct SearchFiles;

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "Show a directory tree (defaults to the current directory)"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::optional("directory")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let requested = args
            .first()
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(".");
        let root = ctx.resolve_path(requested);
        if !root.is_dir() {
            return Err(ToolError::NotFound(requested.to_string()).into());
        }

        let tree = collect_tree(&root);
        let mut lines = vec![format!("{}/", requested.trim_end_matches('/'))];
        render_tree(&root, 0, &tree, &mut lines);
        Ok(ToolOutput::message(lines.join("\n")))
    }
}

#[async_trait]
impl Tool for SearchFiles {
    fn name(&self) -> &'static str {
        "search_files"
    }

    fn description(&self) -> &'static str {
        "Find files and directories whose name contains a pattern (* and ? wildcards allowed)"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("pattern")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let pattern = args[0].trim();
        if pattern.is_empty() {
            return Err(ToolError::EmptyArgument("pattern").into());
        }
        let matcher = name_pattern(pattern)?;

        let mut matches: Vec<PathBuf> = walk_project(ctx.working_dir, MAX_SEARCH_DEPTH)
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.depth() > 0)
            .filter(|entry| matcher.matches(&entry.file_name().to_string_lossy()))
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(ctx.working_dir)
                    .unwrap_or(entry.path())
                    .to_path_buf()
            })
            .collect();
        matches.sort();
        matches.truncate(MAX_SEARCH_RESULTS);

        if matches.is_empty() {
            return Err(anyhow!("No matches found for '{}'", pattern));
        }

        let mut lines = vec![format!("Found {} match(es) for '{}':", matches.len(), pattern)];
        lines.extend(matches.iter().map(|m| m.display().to_string()));
        Ok(ToolOutput::message(lines.join("\n")))
    }
}

/// `*pattern*` matched against a single file name.
fn name_pattern(pattern: &str) -> Result<Pattern> {
    Pattern::new(&format!("*{}*", pattern))
        .with_context(|| format!("Invalid search pattern '{}'", pattern))
}

struct TreeNode {
    name: String,
    path: PathBuf,
    is_dir: bool,
    size: u64,
}

/// Entries under `root` down to `LIST_DEPTH`, grouped by parent directory.
fn collect_tree(root: &Path) -> HashMap<PathBuf, Vec<TreeNode>> {
    let mut tree: HashMap<PathBuf, Vec<TreeNode>> = HashMap::new();

    for entry in walk_project(root, LIST_DEPTH).flatten() {
        if entry.depth() == 0 {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let is_dir = is_dir_entry(&entry);
        let size = if is_dir {
            0
        } else {
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        };
        tree.entry(parent.to_path_buf()).or_default().push(TreeNode {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path().to_path_buf(),
            is_dir,
            size,
        });
    }

    // Directories first, then by name
    for children in tree.values_mut() {
        children.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    }
    tree
}

fn render_tree(
    dir: &Path,
    level: usize,
    tree: &HashMap<PathBuf, Vec<TreeNode>>,
    lines: &mut Vec<String>,
) {
    let Some(children) = tree.get(dir) else {
        return;
    };
    let indent = "  ".repeat(level + 1);

    for node in children.iter().take(MAX_ENTRIES_PER_DIR) {
        if node.is_dir {
            lines.push(format!("{}{}/", indent, node.name));
            render_tree(&node.path, level + 1, tree, lines);
        } else {
            lines.push(format!("{}{} ({})", indent, node.name, format_size(node.size)));
        }
    }

    if children.len() > MAX_ENTRIES_PER_DIR {
        lines.push(format!(
            "{}... {} more",
            indent,
            children.len() - MAX_ENTRIES_PER_DIR
        ));
    }
}

pub fn format_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}TB", value)
}
