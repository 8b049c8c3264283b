//! Session task list.
//!
//! Tasks are only ever appended and moved forward through
//! `pending -> in_progress -> completed`. The rendered list is injected into
//! every prompt so the model keeps its plan across turns.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" | "in-progress" | "in progress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            _ => Err(TaskError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub ordinal: usize,
    pub description: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Task {ordinal} does not exist (the list has {count} task(s))")]
    UnknownOrdinal { ordinal: usize, count: usize },

    #[error("Invalid status '{0}' (expected pending, in_progress or completed)")]
    InvalidStatus(String),

    #[error("Task {ordinal} is already {from} and cannot move back to {to}")]
    BackwardTransition {
        ordinal: usize,
        from: TaskStatus,
        to: TaskStatus,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending task and return its ordinal.
    pub fn add(&mut self, description: impl Into<String>) -> usize {
        let ordinal = self.tasks.len() + 1;
        self.tasks.push(Task {
            ordinal,
            description: description.into(),
            status: TaskStatus::Pending,
        });
        ordinal
    }

    /// Move a task forward. Re-applying the current status is accepted and
    /// changes nothing; any error leaves the list untouched.
    pub fn set_status(&mut self, ordinal: usize, status: TaskStatus) -> Result<(), TaskError> {
        let count = self.tasks.len();
        let task = ordinal
            .checked_sub(1)
            .and_then(|idx| self.tasks.get_mut(idx))
            .ok_or(TaskError::UnknownOrdinal { ordinal, count })?;

        if status.rank() < task.status.rank() {
            return Err(TaskError::BackwardTransition {
                ordinal,
                from: task.status,
                to: status,
            });
        }

        task.status = status;
        Ok(())
    }

    pub fn get(&self, ordinal: usize) -> Option<&Task> {
        ordinal.checked_sub(1).and_then(|idx| self.tasks.get(idx))
    }

    /// The first task currently in progress.
    pub fn get_current(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::InProgress)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count()
    }

    pub fn render(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks yet.".to_string();
        }
        self.tasks
            .iter()
            .map(|t| format!("{}. [{}] {}", t.ordinal, t.status, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
