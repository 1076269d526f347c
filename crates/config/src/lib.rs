//! Configuration loading, validation, and management for Sleuth.
//!
//! Loads configuration from `~/.sleuth/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sleuth/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning engine API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Display name of the engine provider
    #[serde(default = "default_provider")]
    pub provider: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for the tool-call loop
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per engine response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub condenser: CondenserConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub reddit: RedditConfig,

    #[serde(default)]
    pub social: SocialConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("condenser", &self.condenser)
            .field("search", &self.search)
            .field("fetch", &self.fetch)
            .field("reddit", &self.reddit)
            .field("social", &self.social)
            .field("store", &self.store)
            .finish()
    }
}

/// Which repeated actions the tool-call loop refuses to run twice in one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Never suppress repeats
    Off,
    /// Suppress repeated search query strings (default)
    #[default]
    SearchOnly,
    /// Suppress any repeated action with the same arguments
    AllActions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Full action cycles allowed before the forced final answer
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub dedup: DedupPolicy,

    /// Persona sentence placed in the system prompt
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_persona() -> String {
    "You are a helpful, up-to-date AI assistant.".into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            dedup: DedupPolicy::default(),
            persona: default_persona(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CondenserConfig {
    /// Model for extraction calls; falls back to the main model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// A single text above this many tokens is truncated before extraction
    #[serde(default = "default_per_text_token_limit")]
    pub per_text_token_limit: usize,

    /// Characters kept when a text is truncated
    #[serde(default = "default_truncate_chars")]
    pub truncate_chars: usize,

    /// Upper bound on the condensed output, in tokens
    #[serde(default = "default_combined_token_limit")]
    pub combined_token_limit: usize,

    /// Re-condensing passes allowed before hard truncation
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_per_text_token_limit() -> usize {
    20_000
}
fn default_truncate_chars() -> usize {
    40_000
}
fn default_combined_token_limit() -> usize {
    128_000
}
fn default_max_depth() -> u32 {
    3
}

impl Default for CondenserConfig {
    fn default() -> Self {
        Self {
            model: None,
            per_text_token_limit: default_per_text_token_limit(),
            truncate_chars: default_truncate_chars(),
            combined_token_limit: default_combined_token_limit(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Programmable search engine id (`cx`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_id: Option<String>,

    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_num_results")]
    pub default_num_results: u32,

    #[serde(default = "default_max_num_results")]
    pub max_num_results: u32,
}

fn default_search_url() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_num_results() -> u32 {
    5
}
fn default_max_num_results() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            base_url: default_search_url(),
            default_num_results: default_num_results(),
            max_num_results: default_max_num_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("engine_id", &self.engine_id)
            .field("base_url", &self.base_url)
            .field("default_num_results", &self.default_num_results)
            .field("max_num_results", &self.max_num_results)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout() -> u64 {
    20
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36"
        .into()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default = "default_reddit_user_agent")]
    pub user_agent: String,

    /// Top-level comments included in a post extract
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,

    #[serde(default = "default_comment_chars")]
    pub comment_chars: usize,

    #[serde(default = "default_selftext_chars")]
    pub selftext_chars: usize,
}

fn default_reddit_user_agent() -> String {
    "rust:sleuth:v0.1 (research assistant)".into()
}
fn default_max_comments() -> usize {
    5
}
fn default_comment_chars() -> usize {
    100
}
fn default_selftext_chars() -> usize {
    500
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: default_reddit_user_agent(),
            max_comments: default_max_comments(),
            comment_chars: default_comment_chars(),
            selftext_chars: default_selftext_chars(),
        }
    }
}

impl std::fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("user_agent", &self.user_agent)
            .field("max_comments", &self.max_comments)
            .field("comment_chars", &self.comment_chars)
            .field("selftext_chars", &self.selftext_chars)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,

    /// Pre-issued bearer token; skips the token exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    #[serde(default = "default_social_url")]
    pub base_url: String,

    /// Cached session file; defaults to `~/.sleuth/social_session.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Timeline requests allowed per reset window
    #[serde(default = "default_request_budget")]
    pub request_budget: u32,

    #[serde(default = "default_reset_window")]
    pub reset_window_secs: u64,

    /// Pause between consecutive page requests
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,

    #[serde(default = "default_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// Stop after this many pages; unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
}

fn default_social_url() -> String {
    "https://api.x.com".into()
}
fn default_page_size() -> u32 {
    50
}
fn default_request_budget() -> u32 {
    50
}
fn default_reset_window() -> u64 {
    15 * 60
}
fn default_page_delay() -> u64 {
    1000
}
fn default_rate_limit_retries() -> u32 {
    3
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            bearer_token: None,
            base_url: default_social_url(),
            session_file: None,
            page_size: default_page_size(),
            request_budget: default_request_budget(),
            reset_window_secs: default_reset_window(),
            page_delay_ms: default_page_delay(),
            max_rate_limit_retries: default_rate_limit_retries(),
            max_pages: None,
        }
    }
}

impl SocialConfig {
    /// Session cache location, resolving the default.
    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("social_session.json"))
    }
}

impl std::fmt::Debug for SocialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("bearer_token", &redact(&self.bearer_token))
            .field("base_url", &self.base_url)
            .field("session_file", &self.session_file)
            .field("page_size", &self.page_size)
            .field("request_budget", &self.request_budget)
            .field("reset_window_secs", &self.reset_window_secs)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path; defaults to `~/.sleuth/sleuth.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Key-value table name
    #[serde(default = "default_kv_table")]
    pub kv_table: String,
}

fn default_kv_table() -> String {
    "web_content".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            kv_table: default_kv_table(),
        }
    }
}

impl StoreConfig {
    /// Database path, resolving the default.
    pub fn db_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| {
            AppConfig::config_dir()
                .join("sleuth.db")
                .to_string_lossy()
                .into_owned()
        })
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sleuth/config.toml).
    ///
    /// Environment variables override file values:
    /// - `SLEUTH_API_KEY`, then `OPENAI_API_KEY` (only if no key in file)
    /// - `SLEUTH_MODEL`, `SLEUTH_BASE_URL`, `SLEUTH_DB`
    /// - `SEARCH_API_KEY`, `GOOGLE_SEARCH_CX`
    /// - `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`
    /// - `X_API_KEY`, `X_API_SECRET`, `X_BEARER_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("SLEUTH_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("SLEUTH_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("SLEUTH_BASE_URL") {
            self.base_url = url;
        }
        if let Some(db) = lookup("SLEUTH_DB") {
            self.store.path = Some(db);
        }
        if let Some(key) = lookup("SEARCH_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(cx) = lookup("GOOGLE_SEARCH_CX") {
            self.search.engine_id = Some(cx);
        }
        if let Some(id) = lookup("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(id);
        }
        if let Some(secret) = lookup("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(secret);
        }
        if let Some(key) = lookup("X_API_KEY") {
            self.social.api_key = Some(key);
        }
        if let Some(secret) = lookup("X_API_SECRET") {
            self.social.api_secret = Some(secret);
        }
        if let Some(token) = lookup("X_BEARER_TOKEN") {
            self.social.bearer_token = Some(token);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sleuth")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        let c = &self.condenser;
        if c.per_text_token_limit == 0 || c.combined_token_limit == 0 || c.truncate_chars == 0 {
            return Err(ConfigError::ValidationError(
                "condenser limits must be greater than 0".into(),
            ));
        }
        if self.search.default_num_results == 0
            || self.search.default_num_results > self.search.max_num_results
        {
            return Err(ConfigError::ValidationError(
                "search.default_num_results must be between 1 and search.max_num_results".into(),
            ));
        }
        if self.social.page_size == 0 || self.social.request_budget == 0 {
            return Err(ConfigError::ValidationError(
                "social.page_size and social.request_budget must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an engine API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentSettings::default(),
            condenser: CondenserConfig::default(),
            search: SearchConfig::default(),
            fetch: FetchConfig::default(),
            reddit: RedditConfig::default(),
            social: SocialConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.dedup, DedupPolicy::SearchOnly);
        assert_eq!(config.condenser.combined_token_limit, 128_000);
        assert_eq!(config.store.kv_table, "web_content");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.social.reset_window_secs, 900);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4o"

[agent]
dedup = "all_actions"

[search]
engine_id = "cx123"
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.agent.dedup, DedupPolicy::AllActions);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.search.engine_id.as_deref(), Some("cx123"));
        assert_eq!(config.search.default_num_results, 5);
    }

    #[test]
    fn unparseable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("SEARCH_API_KEY", "g-key"),
            ("GOOGLE_SEARCH_CX", "cx"),
            ("X_BEARER_TOKEN", "bearer"),
            ("SLEUTH_DB", "/tmp/x.db"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.search.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.social.bearer_token.as_deref(), Some("bearer"));
        assert_eq!(config.store.db_path(), "/tmp/x.db");
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|k| (k == "OPENAI_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.social.api_secret = Some("x-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("x-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("web_content"));
    }
}
