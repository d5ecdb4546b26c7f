//! Command-line interface argument parsing.
//!
//! Every flag is optional: with none given, gitbae starts the plain
//! interactive loop using config-file values and defaults.

use crate::github::parse_repo_reference;
use clap::Parser;
use std::path::PathBuf;

/// GitBae - ask questions about any GitHub repository
///
/// Chat with a tool-calling model that reads repository metadata,
/// directory listings, and file contents to answer you. Type `exit`
/// to leave.
///
/// Examples:
///   gitbae
///   gitbae --repo rust-lang/rustlings
///   gitbae --model qwen2.5:14b --ollama-url http://gpu-box:11434
///   gitbae --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Repository the conversation is about (owner/repo or GitHub URL)
    ///
    /// Optional; you can also just mention the repository in your questions.
    #[arg(short, long, value_name = "REPO")]
    pub repo: Option<String>,

    /// Model to chat with (must support tool calling)
    #[arg(short, long, env = "GITBAE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Bearer key for hosted or proxied model endpoints
    #[arg(long, env = "OLLAMA_API_KEY", hide_env_values = true)]
    pub model_api_key: Option<String>,

    /// GitHub access token
    ///
    /// Without one, requests go out unauthenticated and private
    /// repositories answer as unauthorized.
    #[arg(long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL (for GitHub Enterprise)
    #[arg(long, value_name = "URL")]
    pub github_api_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .gitbae.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Temperature for model responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Model request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum tool-calling rounds per question
    #[arg(long, value_name = "COUNT")]
    pub max_tool_rounds: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .gitbae.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        for (flag, url) in [
            ("Ollama URL", &self.ollama_url),
            ("GitHub API URL", &self.github_api_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", flag));
                }
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.max_tool_rounds == Some(0) {
            return Err("Max tool rounds must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref repo) = self.repo {
            if parse_repo_reference(repo).is_none() {
                return Err(format!(
                    "Repository must be 'owner/repo' or a GitHub URL, got '{}'",
                    repo
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// Defaults to WARN so log lines stay out of the conversation.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}
