//! toolrelay CLI: the main entry point.
//!
//! Commands:
//! - `serve`     Start the HTTP gateway
//! - `chat`      Run a single chat request through the tool loop
//! - `tools`     List the built-in tools
//! - `providers` List model providers and their availability
//! - `config`    Print the default config, its path, or validate it

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use toolrelay_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolrelay",
    about = "toolrelay: tool-calling orchestration for LLM backends",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: ~/.toolrelay/config.toml)
    #[arg(short, long, global = true, env = "TOOLRELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message and print the answer
    Chat {
        /// The user message
        #[arg(short, long)]
        message: String,

        /// Provider to use (deepinfra, openai, ollama)
        #[arg(long)]
        provider: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Tool the model may call; repeat for several
        #[arg(short, long = "tool")]
        tools: Vec<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in tools
    Tools,

    /// List model providers
    Providers,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: Option<commands::config_cmd::ConfigAction>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_with_path(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config, host, port).await?,
        Commands::Chat {
            message,
            provider,
            model,
            tools,
            json,
        } => {
            let options = commands::chat::ChatOptions {
                message,
                provider,
                model,
                tools,
                json,
            };
            commands::chat::run(&config, options).await?
        }
        Commands::Tools => commands::tools::run(&config)?,
        Commands::Providers => commands::providers::run(&config)?,
        Commands::Config { action } => commands::config_cmd::run(&config, action)?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` means debug, else the configured level.
fn init_tracing(config: &AppConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
