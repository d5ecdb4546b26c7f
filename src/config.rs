//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.gitbae.toml` files. Credentials never live in the file; they come
//! from the environment (or `.env`) through the CLI layer.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".gitbae.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// GitHub REST API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Credentials, filled from CLI/env only.
    #[serde(skip)]
    pub secrets: Secrets,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Print the full conversation when the session ends.
    #[serde(default = "default_true")]
    pub show_history_on_exit: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            show_history_on_exit: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// GitHub REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// API base URL (override for GitHub Enterprise).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_github_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            timeout_seconds: default_github_timeout(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_timeout() -> u64 {
    30
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name (must support tool calling).
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum tool-calling rounds per query.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    300
}

fn default_max_tool_rounds() -> usize {
    25
}

/// API credentials. Absent values degrade to unauthorized calls.
#[derive(Clone, Default)]
pub struct Secrets {
    pub github_token: Option<String>,
    pub model_api_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("github_token", &redact(&self.github_token))
            .field("model_api_key", &redact(&self.model_api_key))
            .finish()
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.gitbae.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their env fallbacks) take precedence over the file.
    /// Only explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(rounds) = args.max_tool_rounds {
            self.model.max_tool_rounds = rounds;
        }
        if let Some(ref url) = args.github_api_url {
            self.github.api_url = url.clone();
        }

        self.secrets = Secrets {
            github_token: non_empty(&args.github_token),
            model_api_key: non_empty(&args.model_api_key),
        };

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged values. File values bypass `Args::validate`.
    pub fn validate(&self) -> Result<()> {
        for (key, url) in [
            ("model.ollama_url", &self.model.ollama_url),
            ("github.api_url", &self.github.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{} must start with 'http://' or 'https://', got '{}'", key, url);
            }
        }

        if !(0.0..=1.0).contains(&self.model.temperature) {
            bail!(
                "model.temperature must be between 0.0 and 1.0, got {}",
                self.model.temperature
            );
        }

        for (key, seconds) in [
            ("model.timeout_seconds", self.model.timeout_seconds),
            ("github.timeout_seconds", self.github.timeout_seconds),
        ] {
            if seconds == 0 {
                bail!("{} must be at least 1 second", key);
            }
        }

        if self.model.max_tool_rounds == 0 {
            bail!("model.max_tool_rounds must be at least 1");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
