use locode_core::ui_writer::UiWriter;
use std::io::{self, Write};
use std::time::Duration;

/// Line-oriented output for scripts driving `--machine`. Every event starts
/// with an upper-case marker; tool output and responses are never truncated.
#[derive(Default)]
pub struct MachineUiWriter;

impl MachineUiWriter {
    pub fn new() -> Self {
        Self
    }
}

/// One `TOOL_ARG` line per argument; multi-line values are joined with `\n`
/// so each marker stays on a single line.
fn arg_line(key: &str, value: &str) -> String {
    format!("TOOL_ARG: {}={}", key, value.replace('\n', "\\n"))
}

fn result_marker(succeeded: bool) -> &'static str {
    if succeeded {
        "TOOL_RESULT: ok"
    } else {
        "TOOL_RESULT: error"
    }
}

impl UiWriter for MachineUiWriter {
    fn print_prompt(&self, iteration: usize, prompt: &str) {
        println!("PROMPT: {}", iteration);
        println!("{}", prompt);
        println!("END_PROMPT");
    }

    fn print_mention(&self, path: &str, chars: usize) {
        println!("MENTION: {} {}", path, chars);
    }

    fn print_tool_call(&self, tool_name: &str, args: &[(&str, String)]) {
        println!("TOOL_CALL: {}", tool_name);
        for (key, value) in args {
            println!("{}", arg_line(key, value));
        }
        println!("TOOL_OUTPUT:");
    }

    fn print_tool_output_line(&self, line: &str) {
        println!("{}", line);
    }

    fn print_tool_output_hidden(&self, hidden_count: usize) {
        println!("TOOL_OUTPUT_HIDDEN_LINES: {}", hidden_count);
    }

    fn print_tool_result(&self, succeeded: bool, duration: &str) {
        println!("{}", result_marker(succeeded));
        println!("TOOL_DURATION: {}", duration);
        println!("END_TOOL_OUTPUT");
    }

    fn print_response_start(&self) {
        println!("AGENT_RESPONSE:");
        let _ = io::stdout().flush();
    }

    fn print_response_chunk(&self, content: &str) {
        print!("{}", content);
        let _ = io::stdout().flush();
    }

    fn print_response_end(&self) {
        println!();
        println!("END_AGENT_RESPONSE");
    }

    fn print_budget_exhausted(&self, requests: usize) {
        println!("TURN_BUDGET_EXHAUSTED: {}", requests);
    }

    fn print_retry(&self, attempt: u32, max_attempts: u32, delay: Duration) {
        println!(
            "RETRY: attempt={} max={} delay_ms={}",
            attempt,
            max_attempts,
            delay.as_millis()
        );
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }

    fn wants_full_output(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_line_keeps_multiline_values_on_one_line() {
        assert_eq!(
            arg_line("content", "fn main() {\n}\n"),
            "TOOL_ARG: content=fn main() {\\n}\\n"
        );
        assert_eq!(arg_line("path", "src/lib.rs"), "TOOL_ARG: path=src/lib.rs");
    }

    #[test]
    fn test_result_marker_reflects_success() {
        assert_eq!(result_marker(true), "TOOL_RESULT: ok");
        assert_eq!(result_marker(false), "TOOL_RESULT: error");
    }
}
