//! Configuration management for webpilot
//!
//! Supports environment variables, config files, and runtime overrides.
//! Every numeric policy (iteration cap, retry budget, snapshot budgets) is a
//! setting rather than a constant.
//!
//! Config file location: ~/.config/webpilot/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::core::error::{PilotError, Result};

/// Main configuration for webpilot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model backends
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Retry policy for provider calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// Orchestrator behavior
    #[serde(default)]
    pub agent: AgentConfig,
    /// Browser automation
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Page snapshot budgets
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Primary and optional secondary model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub primary: ProviderSettings,
    #[serde(default)]
    pub secondary: Option<ProviderSettings>,
}

/// Supported vendor backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "openrouter" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(PilotError::config(format!("Unknown provider: {}", other))),
        }
    }
}

/// Settings for one model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    /// API key; falls back to the kind's usual environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override the vendor endpoint (OpenRouter, proxies, remote Ollama)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl ProviderSettings {
    /// Settings for `kind` with its default model
    pub fn for_kind(kind: ProviderKind) -> Self {
        let model = match kind {
            ProviderKind::Gemini => env::var("WEBPILOT_GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-lite".to_string()),
            ProviderKind::OpenAi => {
                env::var("WEBPILOT_OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string())
            }
            ProviderKind::Ollama => {
                env::var("WEBPILOT_OLLAMA_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string())
            }
        };
        Self {
            kind,
            model,
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Resolve the API key from settings or environment
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        let var = match self.kind {
            ProviderKind::Gemini => "GOOGLE_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Ollama => return None,
        };
        env::var(var).ok().filter(|k| !k.is_empty())
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let secondary = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|_| ProviderSettings::for_kind(ProviderKind::OpenAi));
        Self {
            primary: ProviderSettings::for_kind(ProviderKind::Gemini),
            secondary,
        }
    }
}

/// Retry policy for transient provider failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles every attempt
    pub base_delay_ms: u64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
    /// Random spread applied to each delay (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 16_000,
            jitter_factor: 0.2,
        }
    }
}

/// Orchestrator behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard cap on model round-trips per task
    /// Default: 50
    pub max_iterations: usize,
    /// Turns kept after the task turn when encoding history
    /// Default: 12
    pub history_window: usize,
    /// Pause before the next iteration after a provider failure
    pub provider_error_delay_ms: u64,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per model turn
    pub max_output_tokens: u32,
    /// Replaces the built-in system prompt
    pub system_prompt: Option<String>,
    /// Whether to show debug output
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: env::var("WEBPILOT_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            history_window: 12,
            provider_error_delay_ms: 2000,
            temperature: 0.4,
            max_output_tokens: 500,
            system_prompt: None,
            debug: env::var("WEBPILOT_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Session name for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Default timeout for browser commands in ms
    pub timeout_ms: u64,
    /// Pause after navigation so page scripts can settle
    pub navigation_settle_ms: u64,
    /// Pause after clicks, typing, key presses and scrolling
    pub action_settle_ms: u64,
    /// Upper bound for the `wait` tool
    pub max_wait_secs: f64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            session_name: env::var("WEBPILOT_BROWSER_SESSION")
                .unwrap_or_else(|_| "webpilot".to_string()),
            headed: env::var("WEBPILOT_BROWSER_HEADED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            timeout_ms: 15_000,
            navigation_settle_ms: 2000,
            action_settle_ms: 500,
            max_wait_secs: 5.0,
        }
    }
}

/// Budgets for the page snapshot builder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Deepest element level visited
    pub max_depth: usize,
    /// Characters kept per text run
    pub max_text_len: usize,
    /// Lines emitted per snapshot
    pub max_items: usize,
    /// Pixels above the viewport still considered visible
    pub margin_above: f64,
    /// Pixels below the viewport still considered visible
    pub margin_below: f64,
    /// Ancestor levels searched for a context hint
    pub ancestor_climb: usize,
    /// Indent lines by nesting depth
    pub indent: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_text_len: 100,
            max_items: 400,
            margin_above: 200.0,
            margin_below: 800.0,
            ancestor_climb: 3,
            indent: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            retry: RetryConfig::default(),
            agent: AgentConfig::default(),
            browser: BrowserConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webpilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if Self::config_file().exists() {
            match Self::load_from_file() {
                Ok(config) => return config,
                Err(e) => warn!(
                    path = %Self::config_file().display(),
                    error = %e,
                    "Ignoring config file, using defaults"
                ),
            }
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(PilotError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| PilotError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PilotError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file and return the path
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| PilotError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PilotError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| PilotError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.providers.primary.kind, ProviderKind::Gemini);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.agent.history_window, 12);
        assert_eq!(config.snapshot.max_text_len, 100);
        assert_eq!(config.browser.max_wait_secs, 5.0);
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("max_iterations"));
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
        assert_eq!(parsed.providers.primary.model, config.providers.primary.model);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed = Config::from_toml(
            r#"
            [providers.primary]
            kind = "ollama"
            model = "llama3.1"

            [agent]
            max_iterations = 60
            history_window = 10
            provider_error_delay_ms = 0
            temperature = 0.2
            max_output_tokens = 800
            debug = false

            [browser]
            session_name = "t"
            headed = false
            timeout_ms = 1000
            navigation_settle_ms = 0
            action_settle_ms = 0
            max_wait_secs = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(parsed.providers.primary.kind, ProviderKind::Ollama);
        assert_eq!(parsed.providers.primary.timeout_secs, 60);
        assert!(parsed.providers.secondary.is_none());
        assert_eq!(parsed.agent.max_iterations, 60);
        assert_eq!(parsed.snapshot.max_depth, 20);
        assert_eq!(parsed.retry.base_delay_ms, 1000);
    }

    #[test]
    fn test_sections_fill_missing_keys_from_defaults() {
        let parsed = Config::from_toml(
            r#"
            [providers.primary]
            kind = "gemini"
            model = "gemini-2.5-flash"

            [agent]
            max_iterations = 60

            [browser]
            timeout_ms = 5000

            [retry]
            max_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(parsed.agent.max_iterations, 60);
        assert_eq!(parsed.agent.history_window, 12);
        assert_eq!(parsed.agent.max_output_tokens, 500);
        assert_eq!(parsed.browser.timeout_ms, 5000);
        assert_eq!(parsed.browser.max_wait_secs, 5.0);
        assert_eq!(parsed.retry.max_retries, 1);
        assert_eq!(parsed.retry.max_delay_ms, 16_000);

        let only_agent = Config::from_toml("[agent]\nhistory_window = 4\n").unwrap();
        assert_eq!(only_agent.agent.history_window, 4);
        assert_eq!(only_agent.snapshot.max_depth, 20);
    }

    #[test]
    fn test_browser_is_headless_by_default() {
        if env::var("WEBPILOT_BROWSER_HEADED").is_err() {
            assert!(!BrowserConfig::default().headed);
        }
        let parsed = Config::from_toml("[browser]\nheaded = true\n").unwrap();
        assert!(parsed.browser.headed);
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("OpenRouter".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("webpilot"));
    }
}
