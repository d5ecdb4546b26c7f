//! GitBae - conversational assistant for GitHub repositories
//!
//! An interactive CLI where a tool-calling model answers questions about
//! a repository by fetching its metadata, directory listings, and files
//! through the GitHub REST API.
//!
//! Exit codes:
//!   0 - The user left the conversation
//!   1 - Startup error (invalid flags, unreadable config, bad endpoint URL)

mod agent;
mod cli;
mod config;
mod error;
mod github;
mod models;
mod repl;

use agent::{Controller, OllamaClient};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use github::GitHubClient;
use std::io::IsTerminal;
use std::path::Path;
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets usually come from a local .env file
    dotenv::dotenv().ok();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        return handle_init_config();
    }

    if let Err(e) = run(args).await {
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .gitbae.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Tokens stay in the environment or .env, never in this file.");
    Ok(())
}

/// Initialize logging. `RUST_LOG`, when set, overrides the flag-derived level.
fn init_logging(level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let level = if !args.quiet && config.general.verbose {
        Level::DEBUG
    } else {
        args.log_level()
    };
    init_logging(level);

    info!("GitBae v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    let access = GitHubClient::new(&config).context("Failed to set up the GitHub client")?;
    let model = OllamaClient::new(&config).context("Failed to set up the model client")?;
    let controller = Controller::new(model, access, &config.model);

    let focus = args.repo.as_deref().and_then(github::parse_repo_reference);
    let directive = agent::system_directive(
        focus
            .as_ref()
            .map(|(owner, repo)| (owner.as_str(), repo.as_str())),
    );
    let mut session = controller.create_session(directive);

    let stdout = std::io::stdout();
    if !args.quiet {
        println!("GitBae v{}", env!("CARGO_PKG_VERSION"));
        println!("   Model: {}", config.model.name);
        if let Some((owner, repo)) = &focus {
            println!("   Repository: {}/{}", owner, repo);
        }
        println!("   Type '{}' to quit.\n", repl::EXIT_COMMAND);
    }

    let options = repl::ReplOptions {
        spinner: stdout.is_terminal() && !args.quiet,
        show_history: config.general.show_history_on_exit,
    };

    let input = std::io::stdin().lock();
    let mut output = stdout.lock();
    repl::run(&controller, &mut session, input, &mut output, options).await?;

    Ok(())
}

/// Load configuration from `--config`, the working directory, or defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    Ok(Config::load_default()?.unwrap_or_default())
}
