//! Output seam between the agent loop and whatever displays it.

use std::time::Duration;

/// Events a turn reports while it runs. The agent never writes to a terminal
/// itself; the console, machine and test writers decide how each event looks.
pub trait UiWriter: Send + Sync {
    /// The exact prompt about to be sent for request `iteration` (`--show-prompt`).
    fn print_prompt(&self, iteration: usize, prompt: &str);

    /// A file pulled into the turn by an `@path` mention.
    fn print_mention(&self, path: &str, chars: usize);

    /// A tool is about to run. `args` pairs each value with its parameter
    /// name, already shortened for display.
    fn print_tool_call(&self, tool_name: &str, args: &[(&str, String)]);

    fn print_tool_output_line(&self, line: &str);

    /// Lines of tool output left out of the display.
    fn print_tool_output_hidden(&self, hidden_count: usize);

    /// The tool finished; `duration` is already formatted.
    fn print_tool_result(&self, succeeded: bool, duration: &str);

    /// The model started streaming.
    fn print_response_start(&self);

    fn print_response_chunk(&self, content: &str);

    /// The stream ended, completed or not.
    fn print_response_end(&self);

    /// The turn used all `requests` it was allowed while still calling tools.
    fn print_budget_exhausted(&self, requests: usize);

    /// A timed-out turn will be sent again after `delay`.
    fn print_retry(&self, attempt: u32, max_attempts: u32, delay: Duration);

    fn flush(&self);

    /// Whether tool output should be shown in full instead of the first lines.
    fn wants_full_output(&self) -> bool {
        false
    }
}

/// Discards everything.
pub struct NullUiWriter;

impl UiWriter for NullUiWriter {
    fn print_prompt(&self, _iteration: usize, _prompt: &str) {}
    fn print_mention(&self, _path: &str, _chars: usize) {}
    fn print_tool_call(&self, _tool_name: &str, _args: &[(&str, String)]) {}
    fn print_tool_output_line(&self, _line: &str) {}
    fn print_tool_output_hidden(&self, _hidden_count: usize) {}
    fn print_tool_result(&self, _succeeded: bool, _duration: &str) {}
    fn print_response_start(&self) {}
    fn print_response_chunk(&self, _content: &str) {}
    fn print_response_end(&self) {}
    fn print_budget_exhausted(&self, _requests: usize) {}
    fn print_retry(&self, _attempt: u32, _max_attempts: u32, _delay: Duration) {}
    fn flush(&self) {}
}
