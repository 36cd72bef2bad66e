//! `toolrelay providers`: list model providers and whether they are usable.

use std::fmt::Write;

use toolrelay_config::AppConfig;
use toolrelay_providers::{BackendRouter, ProviderInfo};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let router = BackendRouter::build_from_config(config);
    print!("{}", render(router.default_provider(), &router.providers()));
    Ok(())
}

fn render(default_provider: &str, providers: &[ProviderInfo]) -> String {
    let mut out = String::from("Model providers\n");
    for p in providers {
        let marker = if p.name == default_provider { "*" } else { " " };
        let status = match (p.available, p.requires_api_key) {
            (true, _) => "ready",
            (false, true) => "needs API key",
            (false, false) => "not configured",
        };
        let _ = writeln!(out, "\n {marker} {:<10} {status}", p.name);
        let _ = writeln!(out, "     {}", p.description);
        if !p.models.is_empty() {
            let _ = writeln!(out, "     models: {}", p.models.join(", "));
        }
    }
    out.push_str("\n  * default provider\n");
    out.push_str("  API keys: DEEPINFRA_API_KEY, OPENAI_API_KEY; Ollama URL: OLLAMA_BASE_URL\n");
    out
}
