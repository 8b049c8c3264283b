use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use locode_config::Config;
use locode_core::error_handling::{classify_error, ErrorType, RecoverableError};
use locode_core::tools::listing::format_size;
use locode_core::ui_writer::UiWriter;
use locode_core::{Agent, ModelInfo, TurnCancelled};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::process::exit;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod commands;
mod machine_ui_writer;
mod simple_output;
mod ui_writer_impl;

use commands::{SlashCommand, HELP_TEXT};
use machine_ui_writer::MachineUiWriter;
use simple_output::SimpleOutput;
use ui_writer_impl::ConsoleUiWriter;

const HISTORY_FILE: &str = ".locode_history";
const MAX_TIMEOUT_RETRIES: u32 = 3;

#[derive(Parser, Clone, Debug)]
#[command(name = "locode")]
#[command(about = "A coding agent that runs against a local Ollama model")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Workspace directory (defaults to current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Model to use, or one of the configured aliases
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Ollama server address
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Enable machine-friendly output mode with line markers
    #[arg(long)]
    pub machine: bool,

    /// Show the full prompt sent to the model on every request
    #[arg(long)]
    pub show_prompt: bool,

    /// Skip the project overview in the prompt
    #[arg(long)]
    pub no_analyze: bool,

    /// Task to execute (if provided, runs in single-shot mode instead of interactive)
    pub task: Option<String>,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let workspace_dir = setup_workspace_directory(cli.workspace.as_ref(), cli.machine)?;

    let mut config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.model.clone(),
        cli.base_url.clone(),
    )?;
    if cli.no_analyze {
        config.agent.analyze_project = false;
    }
    info!(
        "Starting locode with model {} at {}",
        config.provider.model, config.provider.base_url
    );

    if cli.machine {
        let agent = Agent::new(config, MachineUiWriter::new(), workspace_dir)?;
        run_session(agent, &cli, SimpleOutput::new_with_mode(true)).await
    } else {
        let agent = Agent::new(config, ConsoleUiWriter::new(), workspace_dir)?;
        run_session(agent, &cli, SimpleOutput::new()).await
    }
}

/// `info` for our crates by default, `debug` with `--verbose`, nothing in
/// machine mode so logs never interleave with the markers.
fn init_logging(cli: &Cli) -> Result<()> {
    if cli.machine {
        let filter = EnvFilter::from_default_env().add_directive("off".parse()?);
        tracing_subscriber::registry().with(filter).init();
        return Ok(());
    }

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in [
        "locode",
        "locode_cli",
        "locode_core",
        "locode_config",
        "locode_providers",
    ] {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
    Ok(())
}

/// Resolve the directory the agent starts in, creating `--workspace` when
/// it does not exist yet.
fn setup_workspace_directory(workspace: Option<&PathBuf>, machine_mode: bool) -> Result<PathBuf> {
    let Some(dir) = workspace else {
        return std::env::current_dir().context("Could not determine the current directory");
    };

    let expanded = PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).as_ref());
    if !expanded.exists() {
        std::fs::create_dir_all(&expanded)
            .with_context(|| format!("Failed to create {}", expanded.display()))?;
        let output = SimpleOutput::new_with_mode(machine_mode);
        output.print(&format!(
            "📁 Created workspace directory: {}",
            expanded.display()
        ));
    }
    if !expanded.is_dir() {
        anyhow::bail!("Workspace is not a directory: {}", expanded.display());
    }
    expanded
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", expanded.display()))
}

async fn run_session<W: UiWriter>(
    mut agent: Agent<W>,
    cli: &Cli,
    output: SimpleOutput,
) -> Result<()> {
    agent.set_show_prompt(cli.show_prompt);

    if let Some(task) = &cli.task {
        check_backend(&agent, &output).await;
        if !execute_task(&mut agent, task, &output).await {
            exit(1);
        }
        return Ok(());
    }

    if output.is_machine() {
        println!("INTERACTIVE_MODE_STARTED");
        let (provider, model) = agent.provider_info();
        println!("PROVIDER: {}", provider);
        println!("MODEL: {}", model);
        println!("WORKSPACE: {}", agent.session().working_dir.display());
    } else {
        print_banner(&agent, &output);
    }
    check_backend(&agent, &output).await;

    run_interactive(agent, &output).await
}

fn print_banner<W: UiWriter>(agent: &Agent<W>, output: &SimpleOutput) {
    output.print("");
    output.print("locode - a local coding agent");
    output.print("      >> what are we working on?");
    output.print("");

    let (provider, model) = agent.provider_info();
    println!(
        "🔧 {}{}{} | {}{}{}",
        SetForegroundColor(Color::Cyan),
        provider,
        ResetColor,
        SetForegroundColor(Color::Yellow),
        model,
        ResetColor
    );

    if let Some(project) = &agent.session().project {
        if let Some(title) = &project.readme_title {
            output.print_dim(&format!("📚 detected: {}", title));
        }
        if let Some((language, _)) = project.languages.first() {
            output.print_dim(&format!(
                "🗂  {} source file(s), mostly {}",
                project.file_count, language
            ));
        }
    }
    output.print_dim(&format!(
        "workspace: {}",
        agent.session().working_dir.display()
    ));
    output.print_dim("Type /help for commands, Ctrl-D to exit.");
    output.print("");
}

/// Reachability check at startup. An unreachable server only warns; the
/// session still starts so the user can fix it and retry.
async fn check_backend<W: UiWriter>(agent: &Agent<W>, output: &SimpleOutput) {
    let base_url = &agent.config().provider.base_url;
    let (_, model) = agent.provider_info();

    match agent.check_backend().await {
        Ok(models) => {
            if output.is_machine() {
                for info in &models {
                    println!("MODEL_AVAILABLE: {} {}", info.name, info.size_bytes);
                }
            }
            match models.iter().find(|m| m.matches(&model)) {
                Some(info) => {
                    info!("Model {} is installed ({} bytes)", info.name, info.size_bytes);
                    if !output.is_machine() {
                        output.print_dim(&format!("✅ {} ({})", info.name, format_size(info.size_bytes)));
                    }
                }
                None => {
                    warn!("Model {} not found among {} installed model(s)", model, models.len());
                    output.print(&format!(
                        "⚠️  Model '{}' is not installed on {}. Run: ollama pull {}",
                        model, base_url, model
                    ));
                    if !output.is_machine() {
                        for line in installed_model_lines(&models) {
                            output.print_dim(&line);
                        }
                    }
                }
            }
        }
        Err(e) => {
            warn!("Backend check failed: {:#}", e);
            output.print(&format!("⚠️  Could not reach Ollama at {}: {}", base_url, e));
            output.print("💡 Start it with `ollama serve`, or point --base-url at a running server.");
        }
    }
}

/// Installed models, largest first, for choosing a replacement.
fn installed_model_lines(models: &[ModelInfo]) -> Vec<String> {
    if models.is_empty() {
        return vec!["No models installed.".to_string()];
    }
    let mut sorted: Vec<&ModelInfo> = models.iter().collect();
    sorted.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.name.cmp(&b.name)));

    let mut lines = vec!["Installed models:".to_string()];
    lines.extend(
        sorted
            .into_iter()
            .map(|m| format!("  {} ({})", m.name, format_size(m.size_bytes))),
    );
    lines
}

async fn run_interactive<W: UiWriter>(mut agent: Agent<W>, output: &SimpleOutput) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let history_file = dirs::home_dir().map(|mut path| {
        path.push(HISTORY_FILE);
        path
    });
    if let Some(ref history_path) = history_file {
        let _ = rl.load_history(history_path);
    }

    let mut multiline_buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = match (output.is_machine(), in_multiline) {
            (true, _) => "",
            (false, true) => "... > ",
            (false, false) => "locode> ",
        };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim_end();

                // Trailing backslash continues the input on the next line
                if let Some(without_backslash) = trimmed.strip_suffix('\\') {
                    multiline_buffer.push_str(without_backslash);
                    multiline_buffer.push('\n');
                    in_multiline = true;
                    continue;
                }

                let input = if in_multiline {
                    multiline_buffer.push_str(&line);
                    in_multiline = false;
                    std::mem::take(&mut multiline_buffer).trim().to_string()
                } else {
                    line.trim().to_string()
                };

                if input.is_empty() {
                    continue;
                }
                rl.add_history_entry(&input)?;

                if let Some(command) = SlashCommand::parse(&input) {
                    if !handle_command(&mut agent, command, output).await {
                        break;
                    }
                    continue;
                }

                execute_task(&mut agent, &input, output).await;
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    output.print("Multi-line input cancelled");
                    multiline_buffer.clear();
                    in_multiline = false;
                } else {
                    output.print("(Ctrl-C only interrupts a running request. Type /exit or press Ctrl-D to quit.)");
                }
            }
            Err(ReadlineError::Eof) => {
                output.print("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref history_path) = history_file {
        let _ = rl.save_history(history_path);
    }

    output.print("👋 Goodbye!");
    Ok(())
}

/// Run one slash command. Returns false when the session should end.
async fn handle_command<W: UiWriter>(
    agent: &mut Agent<W>,
    command: SlashCommand,
    output: &SimpleOutput,
) -> bool {
    if output.is_machine() {
        println!("COMMAND: {}", command.name());
    }

    match command {
        SlashCommand::Help => {
            output.print("");
            output.print(HELP_TEXT);
            output.print("");
        }
        SlashCommand::Clear => {
            agent.clear_history();
            output.print("🧹 Conversation history cleared");
        }
        SlashCommand::Model(None) => {
            let (_, model) = agent.provider_info();
            output.print(&format!("Current model: {}", model));
        }
        SlashCommand::Model(Some(name)) => {
            let model = agent.set_model(&name);
            output.print(&format!("🔄 Switched to model: {}", model));
            check_backend(agent, output).await;
        }
        SlashCommand::Pwd => {
            output.print(&agent.session().working_dir.display().to_string());
        }
        SlashCommand::Cd(None) => {
            output.print("Usage: /cd <path>");
        }
        SlashCommand::Cd(Some(path)) => match agent.change_dir(&path) {
            Ok(dir) => output.print(&format!("📁 Working directory: {}", dir.display())),
            Err(e) => output.print(&format!("❌ {}", e)),
        },
        SlashCommand::Tools => {
            output.print("🛠  Available tools:");
            output.print(&agent.registry().catalog());
        }
        SlashCommand::Todos => {
            output.print(&agent.session().tasks.render());
        }
        SlashCommand::Stats => {
            output.print(&agent.session().stats());
            output.print(&format!(
                "Uptime: {}",
                format_elapsed_time(
                    (chrono::Local::now() - agent.session().started_at)
                        .to_std()
                        .unwrap_or_default()
                )
            ));
        }
        SlashCommand::Exit => return false,
        SlashCommand::Unknown(input) => {
            output.print(&format!(
                "❌ Unknown command: {}. Type /help for available commands.",
                input
            ));
        }
    }
    true
}

/// Run one turn with Ctrl-C cancellation and retries on backend timeouts.
/// Returns whether the turn completed.
async fn execute_task<W: UiWriter>(agent: &mut Agent<W>, input: &str, output: &SimpleOutput) -> bool {
    let started = Instant::now();

    if !output.is_machine() {
        output.print_dim("🤔 Thinking...");
    }

    // The turn itself must see the cancellation so it can roll back
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });
    let execution_result = agent
        .execute_turn_with_retry(input, cancel, MAX_TIMEOUT_RETRIES)
        .await;
    ctrl_c.abort();

    match execution_result {
        Ok(outcome) => {
            output.print_smart(&outcome.response);
            if outcome.attempts > 1 {
                output.print(&format!(
                    "✅ Request succeeded after {} attempts",
                    outcome.attempts
                ));
            }
            if !output.is_machine() {
                output.print_dim(&format!(
                    "⏱️  {} | {} request(s) | {} tool call(s)",
                    format_elapsed_time(started.elapsed()),
                    outcome.iterations,
                    outcome.tool_results.len()
                ));
            }
            true
        }
        Err(e) if e.is::<TurnCancelled>() => {
            output.print("\n⚠️  Operation cancelled by user (Ctrl+C)");
            false
        }
        Err(e) => {
            handle_execution_error(&e, input, output, classify_error(&e));
            false
        }
    }
}

fn handle_execution_error(
    e: &anyhow::Error,
    input: &str,
    output: &SimpleOutput,
    error_type: ErrorType,
) {
    error!("=== TASK EXECUTION ERROR ===");
    error!("Error: {}", e);
    for (depth, cause) in e.chain().skip(1).enumerate() {
        error!("  Caused by [{}]: {}", depth + 1, cause);
    }
    error!("Task input: {}", input);

    if output.is_machine() {
        println!("ERROR: {}", e);
        return;
    }

    output.print(&format!("❌ Error: {}", e));
    match error_type {
        ErrorType::Recoverable(RecoverableError::ConnectionRefused) => {
            output.print("💡 Is Ollama running? Start it with `ollama serve` and try again.");
        }
        ErrorType::Recoverable(RecoverableError::ServerError) => {
            output.print("💡 The server reported an error; the model may still be loading. Try again shortly.");
        }
        ErrorType::Recoverable(RecoverableError::Timeout) => {
            output.print("💡 The model did not respond in time. A smaller model (/model fast) may help.");
        }
        ErrorType::NonRecoverable => {}
    }
}

/// Format a Duration as human-readable elapsed time (e.g., "1h 23m 45s", "5m 30s", "45s")
fn format_elapsed_time(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if seconds > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags_and_task() {
        let cli = Cli::parse_from([
            "locode",
            "--model",
            "fast",
            "--base-url",
            "http://gpu-box:11434",
            "--no-analyze",
            "--machine",
            "fix the build",
        ]);
        assert_eq!(cli.model.as_deref(), Some("fast"));
        assert_eq!(cli.base_url.as_deref(), Some("http://gpu-box:11434"));
        assert!(cli.no_analyze);
        assert!(cli.machine);
        assert!(!cli.show_prompt);
        assert_eq!(cli.task.as_deref(), Some("fix the build"));
    }

    #[test]
    fn test_installed_model_lines_show_sizes_largest_first() {
        let models = vec![
            ModelInfo {
                name: "llama3.2:3b".to_string(),
                size_bytes: 2 * 1024 * 1024 * 1024,
            },
            ModelInfo {
                name: "qwen2.5-coder:7b".to_string(),
                size_bytes: 4 * 1024 * 1024 * 1024 + 512 * 1024 * 1024,
            },
        ];
        assert_eq!(
            installed_model_lines(&models),
            vec![
                "Installed models:",
                "  qwen2.5-coder:7b (4.5GB)",
                "  llama3.2:3b (2.0GB)",
            ]
        );
        assert_eq!(installed_model_lines(&[]), vec!["No models installed."]);
    }

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(format_elapsed_time(Duration::from_millis(420)), "420ms");
        assert_eq!(format_elapsed_time(Duration::from_secs(45)), "45s");
        assert_eq!(format_elapsed_time(Duration::from_secs(330)), "5m 30s");
        assert_eq!(format_elapsed_time(Duration::from_secs(5025)), "1h 23m 45s");
    }

    #[test]
    fn test_workspace_must_be_a_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let file = root.path().join("notes.txt");
        std::fs::write(&file, "").unwrap();
        assert!(setup_workspace_directory(Some(&file), true).is_err());
    }

    #[test]
    fn test_workspace_is_created_when_missing() {
        let root = tempfile::TempDir::new().unwrap();
        let target = root.path().join("nested");
        let resolved = setup_workspace_directory(Some(&target), true).unwrap();
        assert!(resolved.is_dir());
        assert!(resolved.ends_with("nested"));
    }
}
