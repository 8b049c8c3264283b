use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ParamSpec, Tool, ToolContext, ToolError, ToolOutput};

pub struct RunCommand;

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn description(&self) -> &'static str {
        "Run a shell command in the current directory and return its output"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("command")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let command = args[0].trim();
        if command.is_empty() {
            return Err(ToolError::EmptyArgument("command").into());
        }
        debug!("Running shell command in {}: {}", ctx.working_dir.display(), command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start command: {}", command))?;

        // Dropping the pending future on timeout kills the child
        let output = match tokio::time::timeout(ctx.shell_timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to collect command output")?,
            Err(_) => {
                warn!("Command timed out after {:?}: {}", ctx.shell_timeout, command);
                return Err(ToolError::Timeout(ctx.shell_timeout).into());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str("[stderr]\n");
            combined.push_str(stderr.trim_end());
        }

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                output: combined,
            }
            .into());
        }

        Ok(ToolOutput::message(if combined.is_empty() {
            "Command completed with exit code 0 (no output)".to_string()
        } else {
            format!("Exit code: 0\n{}", combined)
        }))
    }
}
