//! Configuration loading, validation, and management for Heimdall.
//!
//! Loads configuration from `~/.heimdall/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.heimdall/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider: openai, gemini, ollama, mistral, or any key of `providers`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override; falls back to the provider's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    4096
}

/// Built-in model for each known provider.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "ollama" => "llama3",
        "gemini" => "gemini-1.5-flash-latest",
        "mistral" => "mistral-small-latest",
        _ => "gpt-4o-mini",
    }
}

/// Environment variable holding the API key for a known provider.
fn provider_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        _ => None,
    }
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
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("providers", &self.providers)
            .field("agent", &self.agent)
            .field("workspace", &self.workspace)
            .field("tools", &self.tools)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Orchestration loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum decisions per operator turn before the loop asks for guidance
    #[serde(default = "default_max_steps")]
    pub max_steps_per_turn: u32,

    /// Most recent memory entries shown to the model (all when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,

    /// Attempts to obtain a well-formed decision within one step
    #[serde(default = "default_parse_attempts")]
    pub max_parse_attempts: u32,
}

fn default_max_steps() -> u32 {
    25
}
fn default_parse_attempts() -> u32 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps_per_turn: default_max_steps(),
            history_window: None,
            max_parse_attempts: default_parse_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root for file-manager paths and console commands; relative to the
    /// current directory unless absolute
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("heimdall_workspace")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub console: ConsoleConfig,

    #[serde(default)]
    pub file_manager: FileManagerConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_console_timeout")]
    pub timeout_secs: u64,

    /// Per-stream cap on captured output
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
}

fn default_console_timeout() -> u64 {
    300
}
fn default_max_output() -> usize {
    64 * 1024
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_console_timeout(),
            max_output_bytes: default_max_output(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileManagerConfig {
    /// Ask the operator before write and append
    #[serde(default)]
    pub confirm_writes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// on, moderate or off
    #[serde(default = "default_safesearch")]
    pub safesearch: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Number of top results whose pages are fetched for synthesis
    #[serde(default)]
    pub fetch_top: usize,

    /// Summarize fetched pages with the configured provider
    #[serde(default)]
    pub summarize: bool,
}

fn default_region() -> String {
    "wt-wt".into()
}
fn default_safesearch() -> String {
    "off".into()
}
fn default_max_results() -> usize {
    3
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            safesearch: default_safesearch(),
            max_results: default_max_results(),
            fetch_top: 0,
            summarize: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.heimdall/config.toml).
    ///
    /// Environment overrides:
    /// - `HEIMDALL_PROVIDER`, `HEIMDALL_MODEL`, `HEIMDALL_WORKSPACE`
    /// - `HEIMDALL_API_KEY`, then the provider's own variable
    ///   (`OPENAI_API_KEY`, `GEMINI_API_KEY`, `MISTRAL_API_KEY`)
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("HEIMDALL_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("HEIMDALL_MODEL") {
            self.model = Some(model);
        }
        if let Some(dir) = lookup("HEIMDALL_WORKSPACE") {
            self.workspace.dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("HEIMDALL_API_KEY") {
            self.api_key = Some(key);
        } else if self.provider_api_key().is_none()
            && let Some(var) = provider_key_var(&self.provider)
        {
            self.api_key = lookup(var);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".heimdall")
    }

    /// Model to request: explicit override, provider config, then built-in.
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .or_else(|| {
                self.providers
                    .get(&self.provider)
                    .and_then(|p| p.default_model.clone())
            })
            .unwrap_or_else(|| default_model_for(&self.provider).to_string())
    }

    /// API key for the active provider, per-provider key first.
    pub fn provider_api_key(&self) -> Option<String> {
        self.providers
            .get(&self.provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps_per_turn == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps_per_turn must be at least 1".into(),
            ));
        }
        if self.agent.max_parse_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_parse_attempts must be at least 1".into(),
            ));
        }
        if self.tools.console.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.console.timeout_secs must be at least 1".into(),
            ));
        }
        let search = &self.tools.web_search;
        if !(1..=10).contains(&search.max_results) {
            return Err(ConfigError::ValidationError(
                "tools.web_search.max_results must be between 1 and 10".into(),
            ));
        }
        if !["on", "moderate", "off"].contains(&search.safesearch.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "tools.web_search.safesearch must be on, moderate or off (got '{}')",
                search.safesearch
            )));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider_api_key().is_some()
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
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            agent: AgentConfig::default(),
            workspace: WorkspaceConfig::default(),
            tools: ToolsConfig::default(),
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
