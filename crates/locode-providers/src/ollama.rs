//! Ollama provider implementation for the locode-providers crate.
//!
//! Talks to the `/api/generate` endpoint of a local Ollama server. Streaming
//! responses are newline-delimited JSON objects:
//!
//! ```text
//! {"model":"qwen2.5-coder:7b","response":"Hel","done":false}
//! {"model":"qwen2.5-coder:7b","response":"lo","done":false}
//! {"model":"qwen2.5-coder:7b","response":"","done":true,"prompt_eval_count":42,"eval_count":7}
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use locode_providers::{CompletionRequest, GenerationOptions, LLMProvider, OllamaProvider};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = OllamaProvider::new("http://localhost:11434".to_string(), 120)?;
//!     let request = CompletionRequest {
//!         model: "qwen2.5-coder:7b".to_string(),
//!         prompt: "user: say hi\n\nassistant: ".to_string(),
//!         stream: true,
//!         options: GenerationOptions::default(),
//!     };
//!
//!     let mut stream = provider.generate(request).await?;
//!     while let Some(chunk) = stream.next().await {
//!         let chunk = chunk?;
//!         print!("{}", chunk.content);
//!         if chunk.finished {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures_util::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use crate::{
    CompletionChunk, CompletionRequest, CompletionStream, LLMProvider, ModelInfo, Usage,
};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    read_timeout: Duration,
}

impl OllamaProvider {
    /// `read_timeout_seconds` bounds each wait for bytes from the server, not
    /// the whole generation, so an answer that keeps streaming is never cut off.
    pub fn new(base_url: String, read_timeout_seconds: u64) -> Result<Self> {
        let read_timeout = Duration::from_secs(read_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        debug!("Initialized Ollama provider at {}", base_url);

        Ok(Self {
            client,
            base_url,
            read_timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> anyhow::Error {
        if e.is_timeout() {
            anyhow!(
                "Ollama at {} sent nothing for {}s (timed out)",
                self.base_url,
                self.read_timeout.as_secs()
            )
        } else {
            anyhow!("Could not connect to Ollama at {}: {}", self.base_url, e)
        }
    }

    fn create_request_body(request: &CompletionRequest) -> OllamaGenerateRequest<'_> {
        OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: request.stream,
            options: OllamaOptions {
                temperature: request.options.temperature,
                num_predict: request.options.max_tokens,
                num_ctx: request.options.context_window,
            },
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let url = format!("{}/api/generate", self.base_url);
        let body = Self::create_request_body(&request);

        debug!(
            "Sending generate request: model={}, prompt_chars={}, stream={}, options={:?}",
            request.model,
            request.prompt.len(),
            request.stream,
            request.options
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Ollama API error {}: {}", status, error_text));
        }

        let (tx, rx) = mpsc::channel(100);

        if request.stream {
            let stream = response.bytes_stream();
            tokio::spawn(async move {
                if let Some(usage) = parse_streaming_response(stream, tx).await {
                    debug!(
                        "Stream completed with usage - prompt: {}, completion: {}",
                        usage.prompt_tokens, usage.completion_tokens
                    );
                }
            });
        } else {
            let parsed: OllamaGenerateChunk = response
                .json()
                .await
                .map_err(|e| anyhow!("Failed to parse Ollama response: {}", e))?;
            let usage = parsed.usage();
            // Channel capacity is larger than the two messages sent here
            let _ = tx.send(Ok(CompletionChunk::text(parsed.response))).await;
            let _ = tx.send(Ok(CompletionChunk::done(usage))).await;
        }

        Ok(ReceiverStream::new(rx))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Ollama API error {}: {}", status, error_text));
        }

        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Ollama model list: {}", e))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size_bytes: m.size.unwrap_or(0),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Decode an NDJSON byte stream into completion chunks.
///
/// Always ends the channel with exactly one `finished` chunk unless the
/// stream failed, in which case the last item is the error.
pub(crate) async fn parse_streaming_response(
    mut stream: impl futures_util::Stream<Item = reqwest::Result<Bytes>> + Unpin,
    tx: mpsc::Sender<Result<CompletionChunk>>,
) -> Option<Usage> {
    let mut buffer = String::new();
    let mut byte_buffer: Vec<u8> = Vec::new();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Ollama stream error: {}", e);
                let error = if e.is_timeout() {
                    anyhow!("Ollama stream stalled (timed out): {}", e)
                } else {
                    anyhow!("Ollama stream error: {}", e)
                };
                let _ = tx.send(Err(error)).await;
                return None;
            }
        };

        byte_buffer.extend_from_slice(&chunk);
        let valid_up_to = match std::str::from_utf8(&byte_buffer) {
            Ok(s) => s.len(),
            // Keep an incomplete multi-byte sequence for the next chunk
            Err(e) => e.valid_up_to(),
        };
        if valid_up_to == 0 {
            continue;
        }
        let valid_bytes: Vec<u8> = byte_buffer.drain(..valid_up_to).collect();
        buffer.push_str(&String::from_utf8_lossy(&valid_bytes));

        while let Some(line_end) = buffer.find('\n') {
            let line = buffer[..line_end].trim().to_string();
            buffer.drain(..line_end + 1);

            match handle_line(&line, &tx).await {
                LineOutcome::Continue => {}
                LineOutcome::Finished(usage) => return usage,
                LineOutcome::Stop => return None,
            }
        }
    }

    // A final object without a trailing newline
    let rest = buffer.trim().to_string();
    if !rest.is_empty() {
        match handle_line(&rest, &tx).await {
            LineOutcome::Finished(usage) => return usage,
            LineOutcome::Stop => return None,
            LineOutcome::Continue => {}
        }
    }

    warn!("Ollama stream ended without a done marker");
    let _ = tx.send(Ok(CompletionChunk::done(None))).await;
    None
}

enum LineOutcome {
    Continue,
    Finished(Option<Usage>),
    Stop,
}

async fn handle_line(line: &str, tx: &mpsc::Sender<Result<CompletionChunk>>) -> LineOutcome {
    if line.is_empty() {
        return LineOutcome::Continue;
    }

    let parsed: OllamaGenerateChunk = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Skipping unparseable stream line ({}): {}", e, line);
            return LineOutcome::Continue;
        }
    };

    if let Some(message) = parsed.error {
        let _ = tx.send(Err(anyhow!("Ollama error: {}", message))).await;
        return LineOutcome::Stop;
    }

    if !parsed.response.is_empty()
        && tx
            .send(Ok(CompletionChunk::text(parsed.response.clone())))
            .await
            .is_err()
    {
        debug!("Receiver dropped, stopping stream");
        return LineOutcome::Stop;
    }

    if parsed.done {
        let usage = parsed.usage();
        let _ = tx.send(Ok(CompletionChunk::done(usage))).await;
        return LineOutcome::Finished(usage);
    }

    LineOutcome::Continue
}

// Ollama API request/response structures

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
    error: Option<String>,
}

impl OllamaGenerateChunk {
    fn usage(&self) -> Option<Usage> {
        if self.prompt_eval_count.is_none() && self.eval_count.is_none() {
            return None;
        }
        Some(Usage {
            prompt_tokens: self.prompt_eval_count.unwrap_or(0),
            completion_tokens: self.eval_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    size: Option<u64>,
}
