//! Web search tool: stub that returns mock search results.
//!
//! A real deployment would call a search API. The stub returns plausible,
//! deterministic results so the orchestration loop can be exercised end to
//! end without network access.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use toolrelay_config::SearchConfig;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{ParamType, Tool, ToolDescriptor, ToolParameter};
use url::form_urlencoded;

pub struct WebSearchTool {
    region: String,
    default_results: u32,
    max_results: u32,
}

impl WebSearchTool {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            region: config.region.clone(),
            default_results: config.default_results.max(1),
            max_results: config.max_results.clamp(1, 10),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(&SearchConfig::default())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "web_search".into(),
            description: "Search the web for current information: facts, recent events, and \
                          anything outside the model's training data. Returns titles, URLs, \
                          and snippets."
                .into(),
            parameters: vec![
                ToolParameter::required("query", ParamType::String, "The search query"),
                ToolParameter::optional(
                    "max_results",
                    ParamType::Integer,
                    &format!(
                        "Maximum number of results (1-{}, default {})",
                        self.max_results, self.default_results
                    ),
                ),
                ToolParameter::optional(
                    "include_content",
                    ParamType::Boolean,
                    "Include page content for each result (default true)",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = required_query("web_search", arguments)?;
        let count = clamp_count(arguments, self.default_results, self.max_results);
        let include_content = arguments
            .get("include_content")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut results = generate_mock_results(query, count);
        if include_content {
            for result in &mut results {
                result.content = Some(format!(
                    "{} {}",
                    result.snippet, "Full page content is not fetched by the offline search backend."
                ));
            }
        }

        Ok(serde_json::json!({
            "query": query,
            "total_found": results.len(),
            "results": results,
            "region": self.region,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "source": "mock_search",
        }))
    }
}

/// The `query` argument, trimmed and non-empty.
pub(crate) fn required_query<'a>(
    tool_name: &str,
    arguments: &'a Map<String, Value>,
) -> Result<&'a str, ToolError> {
    let query = arguments
        .get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();
    if query.is_empty() {
        return Err(ToolError::InvalidArguments {
            tool_name: tool_name.into(),
            parameter: "query".into(),
            reason: "query must not be empty".into(),
        });
    }
    Ok(query)
}

/// `max_results` clamped to `1..=max`, or `default` when absent.
pub(crate) fn clamp_count(arguments: &Map<String, Value>, default: u32, max: u32) -> usize {
    let requested = arguments
        .get("max_results")
        .and_then(Value::as_f64)
        .map(|n| n as i64)
        .unwrap_or(i64::from(default));
    requested.clamp(1, i64::from(max)) as usize
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SearchResult {
    fn new(title: &str, url: &str, snippet: &str) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            content: None,
        }
    }
}

pub(crate) fn generate_mock_results(query: &str, count: usize) -> Vec<SearchResult> {
    let q = query.to_lowercase();

    let templates: Vec<(&str, Vec<SearchResult>)> = vec![
        ("rust", vec![
            SearchResult::new(
                "The Rust Programming Language",
                "https://doc.rust-lang.org/book/",
                "Rust is a systems programming language focused on safety, speed, and concurrency.",
            ),
            SearchResult::new(
                "Rust by Example",
                "https://doc.rust-lang.org/rust-by-example/",
                "A collection of runnable examples that illustrate Rust concepts and standard library usage.",
            ),
            SearchResult::new(
                "crates.io: Rust Package Registry",
                "https://crates.io/",
                "The Rust community's crate registry for sharing and discovering Rust libraries.",
            ),
        ]),
        ("weather", vec![
            SearchResult::new(
                "Weather Forecast - National Weather Service",
                "https://weather.gov/",
                "Current conditions and forecasts for locations across the United States.",
            ),
            SearchResult::new(
                "OpenWeatherMap",
                "https://openweathermap.org/",
                "Free weather API providing current weather data and forecasts for any location.",
            ),
        ]),
    ];

    for (keyword, results) in &templates {
        if q.contains(keyword) {
            return results.iter().take(count).cloned().collect();
        }
    }

    (0..count)
        .map(|i| SearchResult {
            title: format!("Result {} for: {}", i + 1, query),
            url: format!(
                "https://example.com/search?q={}&p={}",
                form_urlencoded::byte_serialize(query.as_bytes()).collect::<String>(),
                i + 1
            ),
            snippet: format!("Mock search result for the query '{query}'."),
            content: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn search_returns_results() {
        let result = WebSearchTool::default()
            .execute(&args(json!({"query": "rust programming"})))
            .await
            .unwrap();

        assert_eq!(result["query"], "rust programming");
        assert_eq!(result["total_found"], 3);
        assert!(result["results"][0]["title"].as_str().unwrap().contains("Rust"));
        assert!(result["results"][0]["content"].is_string());
    }

    #[tokio::test]
    async fn max_results_is_clamped() {
        let tool = WebSearchTool::default();
        let many = tool
            .execute(&args(json!({"query": "anything", "max_results": 50})))
            .await
            .unwrap();
        assert_eq!(many["total_found"], 10);

        let none = tool
            .execute(&args(json!({"query": "anything", "max_results": 0})))
            .await
            .unwrap();
        assert_eq!(none["total_found"], 1);

        let default = tool
            .execute(&args(json!({"query": "anything"})))
            .await
            .unwrap();
        assert_eq!(default["total_found"], 5);
    }

    #[tokio::test]
    async fn content_can_be_excluded() {
        let result = WebSearchTool::default()
            .execute(&args(json!({"query": "weather", "include_content": false})))
            .await
            .unwrap();
        assert!(result["results"][0].get("content").is_none());
    }

    #[test]
    fn fallback_urls_are_query_encoded() {
        let results = generate_mock_results("a&b c", 1);
        assert_eq!(results[0].url, "https://example.com/search?q=a%26b+c&p=1");
    }

    #[tokio::test]
    async fn blank_query_is_invalid() {
        let err = WebSearchTool::default()
            .execute(&args(json!({"query": "   "})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
    }
}
