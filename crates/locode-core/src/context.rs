//! Conversation history, file mentions and prompt assembly.

use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use locode_providers::Usage;

use crate::prompts::{SYSTEM_HEADER, SYSTEM_PROTOCOL};
use crate::todo::TaskList;
use crate::tools::resolve_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolResult => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only record of the session's turns.
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The most recent `size` turns, oldest first.
    pub fn window(&self, size: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(size);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Drop every turn added after the history had `len` turns.
    pub fn truncate_to(&mut self, len: usize) {
        if self.turns.len() > len {
            debug!("Rolling history back from {} to {} turns", self.turns.len(), len);
            self.turns.truncate(len);
        }
    }
}

/// Running token counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, usage: Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(usage.completion_tokens);
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Rough token count for backends that do not report usage.
    pub fn estimate_tokens(text: &str) -> u64 {
        // ~4 characters per token for prose, ~3 for code, plus 10%
        let base_estimate = if text.contains('{') || text.contains("```") || text.contains("fn ") {
            (text.len() as f64 / 3.0).ceil()
        } else {
            (text.len() as f64 / 4.0).ceil()
        };
        (base_estimate * 1.1).ceil() as u64
    }
}

/// A file referenced as `@path` in user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub path: String,
    pub content: String,
}

/// `@path` tokens in order of appearance. The `@` must start the input or
/// follow whitespace, so e-mail addresses are not mentions.
pub fn extract_mentions(input: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    let mut prev: Option<char> = None;
    let mut chars = input.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let at_boundary = prev.map_or(true, char::is_whitespace);
        prev = Some(ch);
        if ch != '@' || !at_boundary {
            continue;
        }

        let rest = &input[idx + 1..];
        let token_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = rest[..token_len].trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        if !token.is_empty() && !mentions.iter().any(|m| m == token) {
            mentions.push(token.to_string());
        }

        // Skip past the token
        while chars.peek().is_some_and(|&(i, _)| i <= idx + token_len) {
            if let Some((_, c)) = chars.next() {
                prev = Some(c);
            }
        }
    }

    mentions
}

/// Read every mentioned file that exists. Unreadable mentions are skipped.
pub fn resolve_mentions(input: &str, working_dir: &Path) -> Vec<Mention> {
    extract_mentions(input)
        .into_iter()
        .filter_map(|path| {
            let full_path = resolve_path(working_dir, &path);
            if !full_path.is_file() {
                warn!("Mentioned file not found: {}", full_path.display());
                return None;
            }
            match fs::read_to_string(&full_path) {
                Ok(content) => Some(Mention { path, content }),
                Err(e) => {
                    warn!("Could not read mentioned file {}: {}", full_path.display(), e);
                    None
                }
            }
        })
        .collect()
}

/// The user turn being answered, with its mentioned files already read.
#[derive(Debug, Clone, Copy)]
pub struct UserTurn<'a> {
    pub text: &'a str,
    pub mentions: &'a [Mention],
}

pub struct PromptInputs<'a> {
    pub catalog: &'a str,
    pub working_dir: &'a Path,
    pub project: Option<&'a str>,
    pub tasks: &'a TaskList,
    pub history: &'a History,
    pub user_turn: Option<UserTurn<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    pub window: usize,
    pub mention_char_budget: usize,
}

impl ContextBuilder {
    pub fn new(window: usize, mention_char_budget: usize) -> Self {
        Self {
            window,
            mention_char_budget,
        }
    }

    /// Assemble the full prompt. Pure: equal inputs give equal output.
    pub fn build(&self, inputs: &PromptInputs<'_>) -> String {
        let mut prompt = self.preamble(inputs);

        for turn in inputs.history.window(self.window) {
            prompt.push_str(&format!("{}: {}\n\n", turn.role, turn.content));
        }

        if let Some(user_turn) = inputs.user_turn {
            prompt.push_str(&format!(
                "{}: {}\n\n",
                Role::User,
                self.user_content(user_turn)
            ));
        }

        prompt.push_str(&format!("{}: ", Role::Assistant));
        prompt
    }

    /// Mentioned files, each delimited and truncated, then the literal text.
    pub fn user_content(&self, user_turn: UserTurn<'_>) -> String {
        let mut content = String::new();
        for mention in user_turn.mentions {
            let body: String = mention
                .content
                .chars()
                .take(self.mention_char_budget)
                .collect();
            content.push_str(&format!("--- File: {} ---\n", mention.path));
            content.push_str(&body);
            if !body.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("--- End of {} ---\n\n", mention.path));
        }
        content.push_str(user_turn.text);
        content
    }

    fn preamble(&self, inputs: &PromptInputs<'_>) -> String {
        let mut preamble = format!(
            "{}\n{}\n\n{}\n\nCurrent directory: {}\n\n",
            SYSTEM_HEADER,
            inputs.catalog,
            SYSTEM_PROTOCOL,
            inputs.working_dir.display()
        );
        if let Some(project) = inputs.project {
            preamble.push_str(&format!("Project overview:\n{}\n\n", project));
        }
        preamble.push_str(&format!("Current tasks:\n{}\n\n", inputs.tasks.render()));
        preamble
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("@notes.txt summarize, then compare with @src/lib.rs."),
            vec!["notes.txt", "src/lib.rs"]
        );
        assert!(extract_mentions("mail me at dev@example.com").is_empty());
        assert!(extract_mentions("a lone @ sign").is_empty());
        assert_eq!(extract_mentions("(see @a.rs) and @a.rs"), vec!["a.rs"]);
    }

    #[test]
    fn test_mention_truncated_to_budget() {
        let builder = ContextBuilder::new(6, 5);
        let mentions = vec![Mention {
            path: "big.txt".to_string(),
            content: "0123456789".to_string(),
        }];
        let content = builder.user_content(UserTurn {
            text: "what is this?",
            mentions: &mentions,
        });
        assert_eq!(
            content,
            "--- File: big.txt ---\n01234\n--- End of big.txt ---\n\nwhat is this?"
        );
    }

    #[test]
    fn test_truncate_to_only_shrinks() {
        let mut history = History::new();
        history.push(ConversationTurn::new(Role::User, "a"));
        history.truncate_to(5);
        assert_eq!(history.len(), 1);
        history.push(ConversationTurn::new(Role::Assistant, "b"));
        history.truncate_to(1);
        assert_eq!(history.turns(), &[ConversationTurn::new(Role::User, "a")]);
    }

    #[test]
    fn test_usage_saturates() {
        let mut usage = TokenUsage {
            prompt_tokens: u64::MAX - 1,
            completion_tokens: 0,
        };
        usage.add(Usage {
            prompt_tokens: 10,
            completion_tokens: 3,
        });
        assert_eq!(usage.prompt_tokens, u64::MAX);
        assert_eq!(usage.completion_tokens, 3);
    }
}
