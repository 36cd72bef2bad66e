//! `toolrelay config`: configuration helpers.

use clap::Subcommand;
use toolrelay_config::AppConfig;

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print a config file with every default filled in
    Default,
    /// Print the default config file path
    Path,
    /// Summarize the loaded configuration
    Check,
}

pub fn run(config: &AppConfig, action: Option<ConfigAction>) -> anyhow::Result<()> {
    match action.unwrap_or(ConfigAction::Default) {
        ConfigAction::Default => print!("{}", AppConfig::default_toml()),
        ConfigAction::Path => println!("{}", config_path().display()),
        ConfigAction::Check => print!("{}", summary(config)),
    }
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Loading already validated `config`; this reports what it resolved to.
fn summary(config: &AppConfig) -> String {
    let mut configured: Vec<&str> = config
        .providers
        .iter()
        .filter(|(_, p)| p.api_key.is_some())
        .map(|(name, _)| name.as_str())
        .collect();
    configured.sort_unstable();

    format!(
        "Config OK\n   Provider:       {}\n   Model:          {}\n   Max iterations: {}\n   Tool timeout:   {}s\n   Gateway:        {}:{}\n   API keys for:   {}\n",
        config.default_provider,
        config.default_model,
        config.max_iterations,
        config.tool_timeout_secs,
        config.gateway.host,
        config.gateway.port,
        if configured.is_empty() {
            "(none)".to_string()
        } else {
            configured.join(", ")
        },
    )
}
