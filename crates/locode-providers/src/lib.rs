//! Inference backends for locode.
//!
//! The agent only needs one capability from a backend: turn a prompt into a
//! finite, non-restartable stream of text fragments. [`LLMProvider`] captures
//! that, and [`OllamaProvider`] implements it against a local Ollama server.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

pub mod ollama;

pub use ollama::OllamaProvider;

/// Sampling and sizing options forwarded to the backend with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            context_window: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One fragment of a streamed completion. The last chunk has `finished` set
/// and carries the token counts when the backend reports them.
#[derive(Debug, Clone, Default)]
pub struct CompletionChunk {
    pub content: String,
    pub finished: bool,
    pub usage: Option<Usage>,
}

impl CompletionChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finished: false,
            usage: None,
        }
    }

    pub fn done(usage: Option<Usage>) -> Self {
        Self {
            content: String::new(),
            finished: true,
            usage,
        }
    }
}

/// A model installed on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    /// On-disk size; 0 when the backend does not report it.
    pub size_bytes: u64,
}

impl ModelInfo {
    /// True when `model` names this entry, allowing the implicit `:latest` tag.
    pub fn matches(&self, model: &str) -> bool {
        self.name == model || self.name.strip_suffix(":latest") == Some(model)
    }
}

pub type CompletionStream = ReceiverStream<Result<CompletionChunk>>;

#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a generation. Errors here mean the request never got a response
    /// (backend unreachable, HTTP error); errors inside the stream mean it
    /// broke mid-way.
    async fn generate(&self, request: CompletionRequest) -> Result<CompletionStream>;

    /// Models the backend can serve. Doubles as a reachability check.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_info_matches_implicit_latest_tag() {
        let info = ModelInfo {
            name: "llama3.2:latest".to_string(),
            size_bytes: 2_019_393_189,
        };
        assert!(info.matches("llama3.2"));
        assert!(info.matches("llama3.2:latest"));
        assert!(!info.matches("llama3.2:3b"));
    }
}
