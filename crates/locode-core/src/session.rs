use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing::info;

use crate::context::{History, TokenUsage};
use crate::project::ProjectDigest;
use crate::todo::TaskList;
use crate::tools::resolve_path;

/// All state owned by one interactive session.
#[derive(Debug, Clone)]
pub struct Session {
    pub working_dir: PathBuf,
    pub history: History,
    pub tasks: TaskList,
    pub usage: TokenUsage,
    pub model: String,
    pub project: Option<ProjectDigest>,
    pub started_at: DateTime<Local>,
    /// User turns that ran to completion.
    pub turns_completed: usize,
}

impl Session {
    pub fn new(working_dir: PathBuf, model: impl Into<String>) -> Self {
        Self {
            working_dir,
            history: History::new(),
            tasks: TaskList::new(),
            usage: TokenUsage::default(),
            model: model.into(),
            project: None,
            started_at: Local::now(),
            turns_completed: 0,
        }
    }

    /// Change the working directory. The target must be an existing directory.
    pub fn change_dir(&mut self, path: &str) -> Result<PathBuf> {
        let target = resolve_path(&self.working_dir, path);
        if !target.is_dir() {
            bail!("Not a directory: {}", target.display());
        }
        let target = target
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", target.display()))?;
        info!("Working directory changed to {}", target.display());
        self.working_dir = target.clone();
        Ok(target)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn stats(&self) -> String {
        let mut stats = format!(
            "Model: {}\nSession started: {}\nTurns: {}\nHistory: {} turn(s)\nTasks: {}/{} completed",
            self.model,
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.turns_completed,
            self.history.len(),
            self.tasks.completed_count(),
            self.tasks.len(),
        );
        if let Some(task) = self.tasks.get_current() {
            stats.push_str(&format!(
                "\nCurrent task: {}. {}",
                task.ordinal, task.description
            ));
        }
        stats.push_str(&format!(
            "\nTokens: {} prompt + {} completion = {}",
            self.usage.prompt_tokens,
            self.usage.completion_tokens,
            self.usage.total()
        ));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::TaskStatus;
    use tempfile::TempDir;

    #[test]
    fn test_change_dir_requires_existing_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();

        let mut session = Session::new(dir.path().to_path_buf(), "m");
        assert!(session.change_dir("file.txt").is_err());
        assert!(session.change_dir("missing").is_err());

        let changed = session.change_dir("sub").unwrap();
        assert!(changed.ends_with("sub"));
        assert_eq!(session.working_dir, changed);
    }

    #[test]
    fn test_stats_names_the_task_in_progress() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new(dir.path().to_path_buf(), "m");
        session.tasks.add("read the code");
        session.tasks.add("fix the bug");
        assert!(!session.stats().contains("Current task"));

        session.tasks.set_status(2, TaskStatus::InProgress).unwrap();
        let stats = session.stats();
        assert!(stats.contains("Tasks: 0/2 completed\nCurrent task: 2. fix the bug\nTokens:"));
    }
}
