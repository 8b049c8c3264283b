use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Locations searched for a config file when none is given explicitly.
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "./locode.toml",
    "~/.config/locode/config.toml",
    "~/.locode.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: OllamaConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
    /// Upper bound on a single generation request, and on the silence between two chunks.
    pub timeout_seconds: u64,
    /// Short names accepted wherever a model name is expected (e.g. `/model fast`).
    #[serde(default)]
    pub model_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Number of trailing conversation turns included in every prompt.
    pub history_window: usize,
    /// Generation requests allowed per user turn before giving up.
    pub max_iterations: usize,
    pub shell_timeout_seconds: u64,
    /// Characters of each `@file` mention inlined into the prompt.
    pub mention_char_budget: usize,
    /// Characters of a `read_file` result handed back to the model.
    pub max_read_chars: usize,
    pub analyze_project: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        let model_aliases = [
            ("fast", "llama3.2:3b"),
            ("balanced", "qwen2.5-coder:7b"),
            ("powerful", "deepseek-coder-v2:16b"),
            ("default", "qwen2.5-coder:7b"),
        ]
        .into_iter()
        .map(|(alias, model)| (alias.to_string(), model.to_string()))
        .collect();

        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            context_window: 8192,
            timeout_seconds: 120,
            model_aliases,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            max_iterations: 10,
            shell_timeout_seconds: 30,
            mention_char_budget: 5000,
            max_read_chars: 20_000,
            analyze_project: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: OllamaConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl OllamaConfig {
    /// Resolve a model alias, falling back to the name itself.
    pub fn resolve_model(&self, name: &str) -> String {
        self.model_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut settings = config::Config::builder();

        // Load default configuration
        settings = settings.add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = config_path {
            let expanded_path = shellexpand::tilde(path);
            if !Path::new(expanded_path.as_ref()).exists() {
                return Err(anyhow::anyhow!("Config file not found: {}", path));
            }
            settings = settings.add_source(config::File::with_name(expanded_path.as_ref()));
        } else {
            for path in &DEFAULT_CONFIG_PATHS {
                let expanded_path = shellexpand::tilde(path);
                if Path::new(expanded_path.as_ref()).exists() {
                    debug!("Loading config from {}", expanded_path);
                    settings =
                        settings.add_source(config::File::with_name(expanded_path.as_ref()));
                    break;
                }
            }
        }

        // Override with environment variables, e.g. LOCODE_PROVIDER__MODEL
        settings = settings.add_source(
            config::Environment::with_prefix("LOCODE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load_with_overrides(
        config_path: Option<&str>,
        model_override: Option<String>,
        base_url_override: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        if let Some(model) = model_override {
            config.provider.model = config.provider.resolve_model(&model);
        }

        if let Some(base_url) = base_url_override {
            config.provider.base_url = base_url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the agent loop unusable.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            anyhow::bail!("agent.max_iterations must be at least 1");
        }
        if self.provider.timeout_seconds == 0 || self.agent.shell_timeout_seconds == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        if self.provider.model.trim().is_empty() {
            anyhow::bail!("provider.model must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
