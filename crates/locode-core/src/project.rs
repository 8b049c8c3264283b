//! Lightweight project survey rendered into the prompt preamble.

use ignore::{DirEntry, Walk, WalkBuilder};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Directories never descended into when surveying or searching.
pub const IGNORED_DIRECTORIES: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "target",
    "bin",
    "obj",
    ".idea",
    ".vscode",
];

const MAX_FILES: usize = 5_000;
const MAX_DEPTH: usize = 8;
const TOP_LANGUAGES: usize = 5;
const TOP_ENTRIES: usize = 20;

pub fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRECTORIES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDigest {
    /// Language name and source file count, most common first.
    pub languages: Vec<(String, usize)>,
    pub entries: Vec<String>,
    pub readme_title: Option<String>,
    pub file_count: usize,
}

impl ProjectDigest {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if let Some(title) = &self.readme_title {
            lines.push(format!("Project: {}", title));
        }
        if !self.languages.is_empty() {
            let languages: Vec<String> = self
                .languages
                .iter()
                .map(|(lang, count)| format!("{} ({} files)", lang, count))
                .collect();
            lines.push(format!("Languages: {}", languages.join(", ")));
        }
        lines.push(format!("Files scanned: {}", self.file_count));
        if !self.entries.is_empty() {
            lines.push(format!("Top-level entries: {}", self.entries.join(", ")));
        }
        lines.join("\n")
    }
}

/// Walker over `root` that skips hidden entries and never follows symlinks.
/// Ignored directories are yielded but not descended into.
pub fn walk_project(root: &Path, max_depth: usize) -> Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .max_depth(Some(max_depth))
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.depth() <= 1 || !inside_ignored_dir(entry));
    builder.build()
}

fn inside_ignored_dir(entry: &DirEntry) -> bool {
    entry
        .path()
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str())
        .is_some_and(is_ignored_dir)
}

pub(crate) fn is_dir_entry(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|t| t.is_dir())
}

/// Survey `dir`. Returns `None` when it holds nothing worth describing.
pub fn analyze_project(dir: &Path) -> Option<ProjectDigest> {
    if !dir.is_dir() {
        return None;
    }

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    let mut file_count = 0;
    for entry in walk_project(dir, MAX_DEPTH).flatten() {
        if entry.depth() == 0 || is_dir_entry(&entry) {
            continue;
        }
        file_count += 1;
        if let Some(lang) = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(language_for_extension)
        {
            *counts.entry(lang).or_insert(0) += 1;
        }
        if file_count >= MAX_FILES {
            break;
        }
    }

    let mut entries: Vec<String> = walk_project(dir, 1)
        .flatten()
        .filter(|entry| entry.depth() == 1)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_ignored_dir(&name) {
                None
            } else if is_dir_entry(&entry) {
                Some(format!("{}/", name))
            } else {
                Some(name)
            }
        })
        .collect();
    entries.truncate(TOP_ENTRIES);

    if file_count == 0 && entries.is_empty() {
        return None;
    }

    let mut languages: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(lang, count)| (lang.to_string(), count))
        .collect();
    languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    languages.truncate(TOP_LANGUAGES);

    let digest = ProjectDigest {
        languages,
        entries,
        readme_title: readme_title(dir),
        file_count,
    };
    debug!("Project digest: {:?}", digest);
    Some(digest)
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext.to_ascii_lowercase().as_str() {
        "rs" => "Rust",
        "py" => "Python",
        "js" | "mjs" | "cjs" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "go" => "Go",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "c" | "h" => "C",
        "cc" | "cpp" | "cxx" | "hpp" => "C++",
        "cs" => "C#",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "sh" | "bash" => "Shell",
        "html" | "htm" => "HTML",
        "css" | "scss" => "CSS",
        _ => return None,
    };
    Some(lang)
}

/// First markdown heading of the README, if any.
fn readme_title(dir: &Path) -> Option<String> {
    ["README.md", "readme.md", "README.markdown", "README"]
        .iter()
        .find_map(|name| fs::read_to_string(dir.join(name)).ok())
        .and_then(|content| {
            content
                .lines()
                .find(|l| l.trim_start().starts_with('#'))
                .map(|l| l.trim_start_matches('#').trim().to_string())
        })
        .filter(|title| !title.is_empty())
}
