//! Built-in tools and the registry that names them.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::todo::TaskList;

pub mod fs;
pub mod listing;
pub mod shell;
pub mod todo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Content of a file before and after a tool touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    /// `None` when the tool created the file.
    pub before: Option<String>,
    pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub message: String,
    pub file_change: Option<FileChange>,
}

impl ToolOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file_change: None,
        }
    }

    pub fn with_change(message: impl Into<String>, change: FileChange) -> Self {
        Self {
            message: message.into(),
            file_change: Some(change),
        }
    }
}

/// Everything a tool may read or mutate while it runs.
pub struct ToolContext<'a> {
    pub working_dir: &'a Path,
    pub tasks: &'a mut TaskList,
    pub shell_timeout: Duration,
    pub max_read_chars: usize,
}

impl ToolContext<'_> {
    /// Resolve `path` against the working directory unless it is absolute.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve_path(self.working_dir, path)
    }
}

pub fn resolve_path(working_dir: &Path, path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path.trim());
    let candidate = Path::new(expanded.as_ref());
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        working_dir.join(candidate)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("{tool} expects {expected}, got {got} argument(s)")]
    Arity {
        tool: String,
        expected: String,
        got: usize,
    },

    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Text to replace was not found in {0}")]
    TextNotFound(String),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command exited with status {code}\n{output}")]
    CommandFailed { code: i32, output: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A tool named '{0}' is already registered")]
    Duplicate(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn params(&self) -> &'static [ParamSpec];

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput>;

    /// `name(a, b, [c])`, as shown in the catalog.
    fn signature(&self) -> String {
        let params: Vec<String> = self
            .params()
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect();
        format!("{}({})", self.name(), params.join(", "))
    }
}

/// Tools in registration order, indexed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Box::new(fs::ReadFile))?;
        registry.register(Box::new(fs::WriteFile))?;
        registry.register(Box::new(fs::EditFile))?;
        registry.register(Box::new(shell::RunCommand))?;
        registry.register(Box::new(listing::ListFiles))?;
        registry.register(Box::new(listing::SearchFiles))?;
        registry.register(Box::new(fs::CreateDirectory))?;
        registry.register(Box::new(todo::AddTodo))?;
        registry.register(Box::new(todo::UpdateTodo))?;
        registry.register(Box::new(todo::ShowTodos))?;
        Ok(registry)
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name();
        if self.index.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&idx| self.tools[idx].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One `- signature: description` line per tool, in registration order.
    pub fn catalog(&self) -> String {
        self.iter()
            .map(|t| format!("- {}: {}", t.signature(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
