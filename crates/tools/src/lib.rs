//! Built-in tool implementations for toolrelay.
//!
//! Tools give the model the ability to act: do math, search the web and
//! the news, read a web page, and summarize a topic.

pub mod calculator;
pub mod news_search;
pub mod web_scraper;
pub mod web_search;
pub mod web_summarizer;

use toolrelay_config::AppConfig;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use news_search::NewsSearchTool;
pub use web_scraper::WebScraperTool;
pub use web_search::WebSearchTool;
pub use web_summarizer::WebSummarizerTool;

/// Create a registry holding every built-in tool, configured from `config`.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool))?;
    registry.register(Box::new(WebSearchTool::new(&config.search)))?;
    registry.register(Box::new(NewsSearchTool))?;
    registry.register(Box::new(WebScraperTool::new(&config.scraping)))?;
    registry.register(Box::new(WebSummarizerTool))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins_in_order() {
        let registry = default_registry(&AppConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "calculator",
                "web_search",
                "news_search",
                "web_scraper",
                "web_summarizer"
            ]
        );
    }

    #[test]
    fn builtins_cannot_be_registered_twice() {
        let mut registry = default_registry(&AppConfig::default()).unwrap();
        let err = registry.register(Box::new(CalculatorTool)).unwrap_err();
        assert_eq!(err, ToolError::Duplicate("calculator".into()));
    }
}
