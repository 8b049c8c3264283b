use locode_core::ui_writer::UiWriter;
use std::io::{self, Write};
use std::time::Duration;

/// Terminal output: streamed responses as-is, tool calls as boxed blocks with
/// coloured diffs, status notices dimmed.
#[derive(Default)]
pub struct ConsoleUiWriter;

impl ConsoleUiWriter {
    pub fn new() -> Self {
        Self
    }
}

/// The argument that best identifies a call: its path or command, else the first.
fn headline_arg<'a>(args: &'a [(&str, String)]) -> Option<&'a str> {
    args.iter()
        .find(|(k, _)| *k == "path" || *k == "command")
        .or_else(|| args.first())
        .map(|(_, v)| v.as_str())
}

/// First line of `value`, cut to `max` characters on a char boundary.
fn header_value(value: &str, max: usize) -> String {
    let first_line = value.lines().next().unwrap_or("");
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

/// Colour for a rendered output line: diff additions green, removals red,
/// hunk headers cyan.
fn line_style(line: &str) -> &'static str {
    if line.starts_with("@@") {
        "\x1b[36m"
    } else if line.starts_with('+') {
        "\x1b[32m"
    } else if line.starts_with('-') {
        "\x1b[31m"
    } else {
        "\x1b[2m"
    }
}

/// Elapsed-time colour: default under a second, yellow, then orange past a minute.
fn timing_style(duration_str: &str) -> &'static str {
    if duration_str.ends_with("ms") {
        ""
    } else if duration_str.contains('m') {
        "\x1b[38;5;208m"
    } else {
        match duration_str.trim_end_matches('s').parse::<f64>() {
            Ok(seconds) if seconds >= 1.0 => "\x1b[33m",
            _ => "",
        }
    }
}

impl UiWriter for ConsoleUiWriter {
    fn print_prompt(&self, iteration: usize, prompt: &str) {
        println!("🔍 Prompt for request {}:", iteration);
        println!("================");
        println!("{}", prompt);
        println!("================");
        println!();
    }

    fn print_mention(&self, path: &str, chars: usize) {
        println!("\x1b[2m📎 Included {} ({} chars)\x1b[0m", path, chars);
    }

    fn print_tool_call(&self, tool_name: &str, args: &[(&str, String)]) {
        println!();
        match headline_arg(args) {
            Some(value) => println!(
                "┌─\x1b[1;32m {}\x1b[0m\x1b[35m | {}\x1b[0m",
                tool_name,
                header_value(value, 80)
            ),
            None => println!("┌─\x1b[1;32m {}\x1b[0m", tool_name),
        }
    }

    fn print_tool_output_line(&self, line: &str) {
        println!("│ {}{}\x1b[0m", line_style(line), line);
    }

    fn print_tool_output_hidden(&self, hidden_count: usize) {
        println!(
            "│ \x1b[2m(... {} more line{})\x1b[0m",
            hidden_count,
            if hidden_count == 1 { "" } else { "s" }
        );
    }

    fn print_tool_result(&self, succeeded: bool, duration: &str) {
        let mark = if succeeded { "✅" } else { "\x1b[1;31m❌ failed\x1b[0m" };
        println!(
            "└─ {} {}{}\x1b[0m",
            mark,
            timing_style(duration),
            duration
        );
        println!();
    }

    fn print_response_start(&self) {
        let _ = io::stdout().flush();
    }

    fn print_response_chunk(&self, content: &str) {
        print!("{}", content);
        let _ = io::stdout().flush();
    }

    fn print_response_end(&self) {
        println!();
    }

    fn print_budget_exhausted(&self, requests: usize) {
        println!(
            "\x1b[33m⚠️  Turn budget exhausted after {} model requests; send a message to continue.\x1b[0m",
            requests
        );
    }

    fn print_retry(&self, attempt: u32, max_attempts: u32, delay: Duration) {
        println!(
            "⏱️  Timeout (attempt {}/{}). Retrying in {:?}...",
            attempt, max_attempts, delay
        );
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
