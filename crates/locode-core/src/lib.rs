pub mod context;
pub mod diff;
pub mod error_handling;
pub mod executor;
pub mod parser;
pub mod project;
mod prompts;
pub mod session;
pub mod todo;
pub mod tools;
pub mod ui_writer;

pub use context::{
    ContextBuilder, ConversationTurn, History, Mention, PromptInputs, Role, TokenUsage, UserTurn,
};
pub use error_handling::TurnCancelled;
pub use executor::{ToolExecutor, ToolResult};
pub use parser::{parse_response, ParsedResponse, ToolCall, ToolCallScanner};
pub use session::Session;
pub use todo::{Task, TaskError, TaskList, TaskStatus};
pub use tools::{Tool, ToolRegistry};

pub use locode_providers::ModelInfo;

use anyhow::{bail, Result};
use locode_config::Config;
use locode_providers::{CompletionRequest, GenerationOptions, LLMProvider, OllamaProvider, Usage};
use std::path::PathBuf;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use context::resolve_mentions;
use error_handling::{calculate_retry_delay, classify_error, ErrorType, RecoverableError};
use ui_writer::UiWriter;

/// What a finished user turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The final model response with tool invocations removed.
    pub response: String,
    /// Generation requests issued during the turn.
    pub iterations: usize,
    pub tool_results: Vec<ToolResult>,
    /// True when the turn stopped because it hit `agent.max_iterations`.
    pub budget_exhausted: bool,
    /// Times the turn was sent, counting timeout retries.
    pub attempts: u32,
}

pub struct Agent<W: UiWriter> {
    config: Config,
    provider: Box<dyn LLMProvider>,
    executor: ToolExecutor,
    context_builder: ContextBuilder,
    session: Session,
    ui_writer: W,
    show_prompt: bool,
    /// Tools executed by the turn in progress or the last one to end.
    tools_run_in_turn: usize,
}

impl<W: UiWriter> Agent<W> {
    /// Create an agent talking to the Ollama server named in `config`.
    pub fn new(config: Config, ui_writer: W, working_dir: PathBuf) -> Result<Self> {
        let provider = OllamaProvider::new(
            config.provider.base_url.clone(),
            config.provider.timeout_seconds,
        )?;
        Self::with_provider(config, Box::new(provider), ui_writer, working_dir)
    }

    pub fn with_provider(
        config: Config,
        provider: Box<dyn LLMProvider>,
        ui_writer: W,
        working_dir: PathBuf,
    ) -> Result<Self> {
        let executor = ToolExecutor::new(
            ToolRegistry::builtin()?,
            Duration::from_secs(config.agent.shell_timeout_seconds),
            config.agent.max_read_chars,
        );
        let context_builder = ContextBuilder::new(
            config.agent.history_window,
            config.agent.mention_char_budget,
        );

        let mut session = Session::new(working_dir, config.provider.model.clone());
        if config.agent.analyze_project {
            session.project = project::analyze_project(&session.working_dir);
        }

        info!(
            "Agent ready: provider={}, model={}, cwd={}",
            provider.name(),
            session.model,
            session.working_dir.display()
        );

        Ok(Self {
            config,
            provider,
            executor,
            context_builder,
            session,
            ui_writer,
            show_prompt: false,
            tools_run_in_turn: 0,
        })
    }

    pub fn set_show_prompt(&mut self, show_prompt: bool) {
        self.show_prompt = show_prompt;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ui_writer(&self) -> &W {
        &self.ui_writer
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// `(provider, model)`
    pub fn provider_info(&self) -> (String, String) {
        (self.provider.name().to_string(), self.session.model.clone())
    }

    /// Ask the backend for its models; fails when it cannot be reached.
    pub async fn check_backend(&self) -> Result<Vec<ModelInfo>> {
        self.provider.list_models().await
    }

    /// Switch model, resolving aliases. Returns the model name now in use.
    pub fn set_model(&mut self, name: &str) -> String {
        let model = self.config.provider.resolve_model(name.trim());
        info!("Switching model from {} to {}", self.session.model, model);
        self.session.model = model.clone();
        model
    }

    pub fn change_dir(&mut self, path: &str) -> Result<PathBuf> {
        let dir = self.session.change_dir(path)?;
        if self.config.agent.analyze_project {
            self.session.project = project::analyze_project(&dir);
        }
        Ok(dir)
    }

    pub fn clear_history(&mut self) {
        self.session.clear_history();
    }

    pub fn build_prompt(&self, user_turn: Option<UserTurn<'_>>) -> String {
        let catalog = self.executor.registry().catalog();
        let project = self.session.project.as_ref().map(|p| p.render());
        self.context_builder.build(&PromptInputs {
            catalog: &catalog,
            working_dir: &self.session.working_dir,
            project: project.as_deref(),
            tasks: &self.session.tasks,
            history: &self.session.history,
            user_turn,
        })
    }

    /// Answer one user input, running tools until the model stops calling
    /// them or the iteration budget is spent.
    ///
    /// On cancellation or a backend failure the history is restored to what
    /// it was before the turn; effects of tools that already ran are kept.
    pub async fn execute_turn(
        &mut self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let history_len_at_start = self.session.history.len();
        self.tools_run_in_turn = 0;

        match self.run_turn(input, &cancel).await {
            Ok(outcome) => {
                self.session.turns_completed += 1;
                Ok(outcome)
            }
            Err(e) => {
                self.session.history.truncate_to(history_len_at_start);
                Err(e)
            }
        }
    }

    /// [`execute_turn`](Self::execute_turn) that sends the turn again when the
    /// backend timed out, up to `max_attempts` in total.
    ///
    /// Only a turn that failed before any tool ran is retried. Replaying one
    /// whose tools already touched files or the task list would repeat them.
    pub async fn execute_turn_with_retry(
        &mut self,
        input: &str,
        cancel: CancellationToken,
        max_attempts: u32,
    ) -> Result<TurnOutcome> {
        let mut attempt = 1;
        loop {
            let error = match self.execute_turn(input, cancel.clone()).await {
                Ok(outcome) => return Ok(TurnOutcome { attempts: attempt, ..outcome }),
                Err(e) => e,
            };

            let timed_out = matches!(
                classify_error(&error),
                ErrorType::Recoverable(RecoverableError::Timeout)
            );
            if !timed_out || attempt >= max_attempts {
                return Err(error);
            }
            if self.tools_run_in_turn > 0 {
                warn!(
                    "Not retrying: {} tool(s) already ran before the timeout",
                    self.tools_run_in_turn
                );
                return Err(error);
            }

            let delay = calculate_retry_delay(attempt);
            warn!(
                "Timeout on attempt {}/{}, retrying in {:?}: {}",
                attempt, max_attempts, delay, error
            );
            self.ui_writer.print_retry(attempt, max_attempts, delay);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TurnCancelled.into()),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn run_turn(&mut self, input: &str, cancel: &CancellationToken) -> Result<TurnOutcome> {
        let mentions = resolve_mentions(input, &self.session.working_dir);
        for mention in &mentions {
            self.ui_writer
                .print_mention(&mention.path, mention.content.chars().count());
        }
        let user_turn = UserTurn {
            text: input,
            mentions: &mentions,
        };

        let max_iterations = self.config.agent.max_iterations;
        let mut tool_results = Vec::new();
        let mut response = String::new();

        for iteration in 1..=max_iterations {
            let first = iteration == 1;
            let prompt = self.build_prompt(first.then_some(user_turn));
            debug!(
                "Iteration {}/{}: prompt is {} chars",
                iteration,
                max_iterations,
                prompt.len()
            );
            if self.show_prompt {
                self.ui_writer.print_prompt(iteration, &prompt);
            }

            let (raw, usage) = self.stream_response(&prompt, cancel).await?;
            let usage = usage.unwrap_or_else(|| Usage {
                prompt_tokens: TokenUsage::estimate_tokens(&prompt),
                completion_tokens: TokenUsage::estimate_tokens(&raw),
            });
            self.session.usage.add(usage);

            if first {
                let content = self.context_builder.user_content(user_turn);
                self.session.history.push(ConversationTurn::new(Role::User, content));
            }
            self.session
                .history
                .push(ConversationTurn::new(Role::Assistant, raw.as_str()));

            let parsed = parse_response(&raw, self.executor.registry());
            response = parsed.residual.trim().to_string();
            if parsed.calls.is_empty() {
                return Ok(TurnOutcome {
                    response,
                    iterations: iteration,
                    tool_results,
                    budget_exhausted: false,
                    attempts: 1,
                });
            }

            debug!("Executing {} tool call(s)", parsed.calls.len());
            let mut results_text = Vec::with_capacity(parsed.calls.len());
            for call in &parsed.calls {
                if cancel.is_cancelled() {
                    return Err(TurnCancelled.into());
                }
                let result = self
                    .executor
                    .execute(call, &mut self.session, &self.ui_writer)
                    .await;
                self.tools_run_in_turn += 1;
                results_text.push(format!("Tool result [{}]: {}", result.tool, result.summary));
                tool_results.push(result);
            }
            self.session
                .history
                .push(ConversationTurn::new(Role::ToolResult, results_text.join("\n\n")));
        }

        warn!("Turn stopped after {} iterations", max_iterations);
        self.ui_writer.print_budget_exhausted(max_iterations);
        Ok(TurnOutcome {
            response,
            iterations: max_iterations,
            tool_results,
            budget_exhausted: true,
            attempts: 1,
        })
    }

    /// Stream one completion to the UI and return the accumulated text.
    async fn stream_response(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, Option<Usage>)> {
        let request = CompletionRequest {
            model: self.session.model.clone(),
            prompt: prompt.to_string(),
            stream: true,
            options: GenerationOptions {
                temperature: self.config.provider.temperature,
                max_tokens: self.config.provider.max_tokens,
                context_window: self.config.provider.context_window,
            },
        };
        let chunk_timeout = Duration::from_secs(self.config.provider.timeout_seconds);

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TurnCancelled.into()),
            result = tokio::time::timeout(chunk_timeout, self.provider.generate(request)) => match result {
                Ok(stream) => stream?,
                Err(_) => bail!(
                    "Model did not start responding within {}s (timed out)",
                    chunk_timeout.as_secs()
                ),
            },
        };

        self.ui_writer.print_response_start();
        let mut buffer = String::new();
        let mut usage = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.ui_writer.print_response_end();
                    return Err(TurnCancelled.into());
                }
                next = tokio::time::timeout(chunk_timeout, stream.next()) => next,
            };

            match next {
                Err(_) => {
                    self.ui_writer.print_response_end();
                    bail!(
                        "No response from model for {}s (timed out)",
                        chunk_timeout.as_secs()
                    )
                }
                Ok(None) => {
                    debug!("Stream closed without a completion marker");
                    break;
                }
                Ok(Some(Err(e))) => {
                    self.ui_writer.print_response_end();
                    return Err(e);
                }
                Ok(Some(Ok(chunk))) => {
                    if !chunk.content.is_empty() {
                        self.ui_writer.print_response_chunk(&chunk.content);
                        buffer.push_str(&chunk.content);
                    }
                    if chunk.finished {
                        usage = chunk.usage;
                        break;
                    }
                }
            }
        }

        self.ui_writer.print_response_end();
        self.ui_writer.flush();
        debug!("Received {} chars from model", buffer.len());
        Ok((buffer, usage))
    }
}
