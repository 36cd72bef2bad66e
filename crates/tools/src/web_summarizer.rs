//! Web summarizer tool: searches, then condenses the top sources into one
//! short overview with attributions.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{ParamType, Tool, ToolDescriptor, ToolParameter};

use crate::web_search::{SearchResult, generate_mock_results, required_query};

const NAME: &str = "web_summarizer";
const DEFAULT_SOURCES: i64 = 3;
const MAX_SOURCES: i64 = 5;
const SNIPPET_CHARS: usize = 200;

pub struct WebSummarizerTool;

#[derive(Debug, Serialize)]
struct Source {
    title: String,
    url: String,
    snippet: String,
}

impl From<&SearchResult> for Source {
    fn from(result: &SearchResult) -> Self {
        Self {
            title: result.title.clone(),
            url: result.url.clone(),
            snippet: result.snippet.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

#[async_trait]
impl Tool for WebSummarizerTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.into(),
            description: "Search the web and write a short summary drawn from several sources. \
                          Use for an overview of a topic rather than a single fact."
                .into(),
            parameters: vec![
                ToolParameter::required(
                    "query",
                    ParamType::String,
                    "Topic or question to research and summarize",
                ),
                ToolParameter::optional(
                    "max_sources",
                    ParamType::Integer,
                    "Number of sources to draw from (1-5, default 3)",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = required_query(NAME, arguments)?;
        let max_sources = arguments
            .get("max_sources")
            .and_then(Value::as_f64)
            .map(|n| n as i64)
            .unwrap_or(DEFAULT_SOURCES)
            .clamp(1, MAX_SOURCES) as usize;

        let results = generate_mock_results(query, max_sources);
        let sources: Vec<Source> = results.iter().map(Source::from).collect();

        Ok(serde_json::json!({
            "query": query,
            "summary": summarize(query, &results),
            "sources_count": sources.len(),
            "sources": sources,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "search_results_total": results.len(),
        }))
    }
}

/// One paragraph built from the source snippets, each tagged with its
/// position in `sources`.
fn summarize(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No sources found for '{query}'.");
    }

    let body: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{} [{}]", r.snippet.trim_end(), i + 1))
        .collect();

    format!(
        "Summary of {} source{} for '{query}': {}",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        body.join(" ")
    )
}
