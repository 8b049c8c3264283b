use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{ParamSpec, Tool, ToolContext, ToolError, ToolOutput};
use crate::todo::TaskStatus;

pub struct AddTodo;
pub struct UpdateTodo;
pub struct ShowTodos;

#[async_trait]
impl Tool for AddTodo {
    fn name(&self) -> &'static str {
        "add_todo"
    }

    fn description(&self) -> &'static str {
        "Add a task to the plan"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("description")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let description = args[0].trim();
        if description.is_empty() {
            return Err(ToolError::EmptyArgument("description").into());
        }
        let ordinal = ctx.tasks.add(description);
        Ok(ToolOutput::message(format!("Added task {}: {}", ordinal, description)))
    }
}

#[async_trait]
impl Tool for UpdateTodo {
    fn name(&self) -> &'static str {
        "update_todo"
    }

    fn description(&self) -> &'static str {
        "Set a task's status to pending, in_progress or completed"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("ordinal"), ParamSpec::required("status")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let ordinal: usize = args[0]
            .trim()
            .trim_start_matches('#')
            .parse()
            .with_context(|| format!("Task number must be a positive integer, got '{}'", args[0]))?;
        let status: TaskStatus = args[1].parse()?;

        ctx.tasks.set_status(ordinal, status)?;
        Ok(ToolOutput::message(format!("Task {} is now {}", ordinal, status)))
    }
}

#[async_trait]
impl Tool for ShowTodos {
    fn name(&self) -> &'static str {
        "show_todos"
    }

    fn description(&self) -> &'static str {
        "Show the current task list"
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    async fn invoke(&self, _args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        Ok(ToolOutput::message(ctx.tasks.render()))
    }
}
