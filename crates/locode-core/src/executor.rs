//! Runs parsed tool calls against the registry and reports what happened.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::diff::LineDiff;
use crate::parser::ToolCall;
use crate::session::Session;
use crate::tools::{FileChange, Tool, ToolContext, ToolError, ToolOutput, ToolRegistry};
use crate::ui_writer::UiWriter;

const MAX_DISPLAY_LINES: usize = 5;
const MAX_LINE_WIDTH: usize = 80;
const MAX_ARG_DISPLAY: usize = 100;
const DIFF_CONTEXT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool: String,
    /// Text shown to the user and fed back to the model.
    pub summary: String,
    pub succeeded: bool,
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    shell_timeout: Duration,
    max_read_chars: usize,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, shell_timeout: Duration, max_read_chars: usize) -> Self {
        Self {
            registry,
            shell_timeout,
            max_read_chars,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call. Every failure is folded into the returned result.
    pub async fn execute<W: UiWriter>(
        &self,
        call: &ToolCall,
        session: &mut Session,
        ui: &W,
    ) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            let error = ToolError::UnknownTool(call.name.clone());
            warn!("{}", error);
            ui.print_tool_call(&call.name, &[]);
            return self.report_failure(&call.name, &error.to_string(), Duration::ZERO, ui);
        };

        let shown_args: Vec<(&str, String)> = call
            .args
            .iter()
            .enumerate()
            .map(|(idx, arg)| {
                let key = tool.params().get(idx).map_or("extra", |p| p.name);
                (key, display_arg(arg))
            })
            .collect();
        ui.print_tool_call(&call.name, &shown_args);

        if let Err(error) = check_arity(tool, &call.args) {
            warn!("{}", error);
            return self.report_failure(&call.name, &error.to_string(), Duration::ZERO, ui);
        }

        let mut ctx = ToolContext {
            working_dir: &session.working_dir,
            tasks: &mut session.tasks,
            shell_timeout: self.shell_timeout,
            max_read_chars: self.max_read_chars,
        };

        let start = Instant::now();
        let outcome = tool.invoke(&call.args, &mut ctx).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(output) => {
                info!(
                    "Tool {} succeeded in {}",
                    call.name,
                    format_duration(elapsed)
                );
                let summary = render_output(&output);
                self.display_lines(&summary, ui);
                ui.print_tool_result(true, &format_duration(elapsed));
                ToolResult {
                    tool: call.name.clone(),
                    summary,
                    succeeded: true,
                }
            }
            Err(error) => {
                warn!("Tool {} failed: {:#}", call.name, error);
                self.report_failure(&call.name, &format!("{:#}", error), elapsed, ui)
            }
        }
    }

    fn report_failure<W: UiWriter>(
        &self,
        tool: &str,
        message: &str,
        elapsed: Duration,
        ui: &W,
    ) -> ToolResult {
        let summary = format!("Error: {}", message);
        self.display_lines(message, ui);
        ui.print_tool_result(false, &format_duration(elapsed));
        ToolResult {
            tool: tool.to_string(),
            summary,
            succeeded: false,
        }
    }

    fn display_lines<W: UiWriter>(&self, text: &str, ui: &W) {
        let lines: Vec<&str> = text.lines().collect();
        let wants_full = ui.wants_full_output();

        for line in lines.iter().take(if wants_full { lines.len() } else { MAX_DISPLAY_LINES }) {
            ui.print_tool_output_line(&clip_line(line, MAX_LINE_WIDTH, !wants_full));
        }
        if !wants_full && lines.len() > MAX_DISPLAY_LINES {
            ui.print_tool_output_hidden(lines.len() - MAX_DISPLAY_LINES);
        }
    }
}

/// Required parameters must be present and nothing beyond the declared ones.
pub fn check_arity(tool: &dyn Tool, args: &[String]) -> Result<(), ToolError> {
    let params = tool.params();
    let required = params.iter().filter(|p| p.required).count();
    if args.len() >= required && args.len() <= params.len() {
        return Ok(());
    }

    let expected = if required == params.len() {
        format!("{} argument(s)", required)
    } else {
        format!("{} to {} argument(s)", required, params.len())
    };
    Err(ToolError::Arity {
        tool: tool.signature(),
        expected,
        got: args.len(),
    })
}

fn render_output(output: &ToolOutput) -> String {
    let summary = match &output.file_change {
        Some(change) => format!("{}\n{}", output.message, render_change(change)),
        None => output.message.clone(),
    };
    summary.trim_end().to_string()
}

fn render_change(change: &FileChange) -> String {
    match &change.before {
        None => format!("{} lines written", change.after.lines().count()),
        Some(before) => {
            let diff = LineDiff::compute(before, &change.after);
            if !diff.has_changes() {
                return "No changes".to_string();
            }
            let (added, removed) = diff.stats();
            debug!(
                "Diff for {}: +{} -{}",
                change.path.display(),
                added,
                removed
            );
            format!("+{} -{}\n{}", added, removed, diff.render(DIFF_CONTEXT))
        }
    }
}

fn display_arg(arg: &str) -> String {
    let first_line = arg.lines().next().unwrap_or("");
    let multi_line = arg.lines().nth(1).is_some();
    if first_line.chars().count() > MAX_ARG_DISPLAY {
        let truncated: String = first_line.chars().take(MAX_ARG_DISPLAY).collect();
        format!("{}...", truncated)
    } else if multi_line {
        format!("{}...", first_line)
    } else {
        first_line.to_string()
    }
}

fn clip_line(line: &str, max_width: usize, truncate: bool) -> String {
    if !truncate || line.chars().count() <= max_width {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(max_width.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let minutes = total_ms / 60_000;
        let remaining_seconds = (total_ms % 60_000) as f64 / 1000.0;
        format!("{}m {:.1}s", minutes, remaining_seconds)
    }
}
