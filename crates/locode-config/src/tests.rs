use super::*;

#[test]
fn defaults_match_local_agent_settings() {
    let config = Config::default();
    assert_eq!(config.provider.base_url, "http://localhost:11434");
    assert_eq!(config.agent.history_window, 6);
    assert_eq!(config.agent.shell_timeout_seconds, 30);
    assert_eq!(config.agent.mention_char_budget, 5000);
    assert!(config.validate().is_ok());
}

#[test]
fn aliases_resolve_and_unknown_names_pass_through() {
    let provider = OllamaConfig::default();
    assert_eq!(provider.resolve_model("fast"), "llama3.2:3b");
    assert_eq!(provider.resolve_model("mistral:7b"), "mistral:7b");
}

#[test]
fn zero_iterations_is_rejected() {
    let mut config = Config::default();
    config.agent.max_iterations = 0;
    assert!(config.validate().is_err());
}

#[test]
fn toml_round_trip_keeps_agent_settings() {
    let mut config = Config::default();
    config.agent.max_iterations = 4;
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.agent.max_iterations, 4);
    assert_eq!(parsed.provider.model, config.provider.model);
}
