#![allow(dead_code)]

use anyhow::Result;
use locode_core::ui_writer::UiWriter;
use locode_providers::{
    CompletionChunk, CompletionRequest, CompletionStream, LLMProvider, ModelInfo, Usage,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// Mock UI Writer for testing
#[derive(Clone, Default)]
pub struct MockUiWriter {
    output: Arc<Mutex<Vec<String>>>,
}

impl MockUiWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_output(&self) -> Vec<String> {
        self.output.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.output.lock().unwrap().push(line);
    }
}

impl UiWriter for MockUiWriter {
    fn print_prompt(&self, _iteration: usize, _prompt: &str) {}
    fn print_mention(&self, path: &str, chars: usize) {
        self.push(format!("MENTION: {} ({} chars)", path, chars));
    }
    fn print_tool_call(&self, tool_name: &str, _args: &[(&str, String)]) {
        self.push(format!("TOOL: {}", tool_name));
    }
    fn print_tool_output_line(&self, line: &str) {
        self.push(format!("OUT: {}", line));
    }
    fn print_tool_output_hidden(&self, _hidden_count: usize) {}
    fn print_tool_result(&self, succeeded: bool, _duration: &str) {
        self.push(format!("RESULT: {}", if succeeded { "ok" } else { "error" }));
    }
    fn print_response_start(&self) {}
    fn print_response_chunk(&self, content: &str) {
        self.push(format!("AGENT: {}", content));
    }
    fn print_response_end(&self) {}
    fn print_budget_exhausted(&self, requests: usize) {
        self.push(format!("BUDGET_EXHAUSTED: {}", requests));
    }
    fn print_retry(&self, attempt: u32, max_attempts: u32, _delay: Duration) {
        self.push(format!("RETRY: {}/{}", attempt, max_attempts));
    }
    fn flush(&self) {}
}

/// How one scripted generation behaves.
pub enum Script {
    /// Stream these fragments, then finish with the given usage.
    Reply(Vec<&'static str>, Option<Usage>),
    /// Stream these fragments, then never finish.
    Stall(Vec<&'static str>),
    /// Fail before any response arrives.
    Unreachable,
}

/// In-memory provider that replays scripted responses in order and records prompts.
#[derive(Clone)]
pub struct ScriptedProvider {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replies(replies: Vec<&'static str>) -> Self {
        Self::new(
            replies
                .into_iter()
                .map(|r| Script::Reply(vec![r], None))
                .collect(),
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, request: CompletionRequest) -> Result<CompletionStream> {
        self.prompts.lock().unwrap().push(request.prompt);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Reply(vec!["(no more scripted replies)"], None));

        let (tx, rx) = mpsc::channel(16);
        match script {
            Script::Unreachable => {
                anyhow::bail!("Could not connect to Ollama at http://localhost:11434")
            }
            Script::Reply(fragments, usage) => {
                for fragment in fragments {
                    tx.send(Ok(CompletionChunk::text(fragment))).await.unwrap();
                }
                tx.send(Ok(CompletionChunk::done(usage))).await.unwrap();
            }
            Script::Stall(fragments) => {
                for fragment in fragments {
                    tx.send(Ok(CompletionChunk::text(fragment))).await.unwrap();
                }
                // Keep the sender alive so the stream never ends
                tokio::spawn(async move {
                    tx.closed().await;
                });
            }
        }
        Ok(ReceiverStream::new(rx))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            name: "scripted".to_string(),
            size_bytes: 0,
        }])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
