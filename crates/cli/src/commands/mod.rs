//! Subcommand implementations.

pub mod chat;
pub mod config_cmd;
pub mod providers;
pub mod serve;
pub mod tools;

use std::sync::Arc;

use toolrelay_agent::Orchestrator;
use toolrelay_config::AppConfig;
use toolrelay_providers::BackendRouter;

/// Backend router, built-in tools and orchestrator, all from `config`.
pub fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let router = Arc::new(BackendRouter::build_from_config(config));
    let registry = Arc::new(toolrelay_tools::default_registry(config)?);
    Ok(Orchestrator::from_config(config, router, registry))
}
