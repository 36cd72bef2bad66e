//! News search tool: stub over the same offline results as `web_search`,
//! shaped as news items with a publication date and a time window.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{ParamType, Tool, ToolDescriptor, ToolParameter};

use crate::web_search::{clamp_count, generate_mock_results, required_query};

const DEFAULT_RESULTS: u32 = 8;
const MAX_RESULTS: u32 = 15;

pub struct NewsSearchTool;

#[async_trait]
impl Tool for NewsSearchTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "news_search".into(),
            description: "Search recent news and current events: politics, sports results, \
                          announcements."
                .into(),
            parameters: vec![
                ToolParameter::required("query", ParamType::String, "News search query"),
                ToolParameter::optional(
                    "max_results",
                    ParamType::Integer,
                    "Maximum number of news items (1-15, default 8)",
                ),
                ToolParameter::optional(
                    "time_range",
                    ParamType::String,
                    "Period: 'd' (day), 'w' (week), 'm' (month), 'y' (year). Default 'w'",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = required_query("news_search", arguments)?;
        let count = clamp_count(arguments, DEFAULT_RESULTS, MAX_RESULTS);
        let time_range = match arguments.get("time_range").and_then(Value::as_str) {
            Some(r @ ("d" | "w" | "m" | "y")) => r,
            _ => "w",
        };

        let now = Utc::now();
        let window = match time_range {
            "d" => Duration::days(1),
            "m" => Duration::days(30),
            "y" => Duration::days(365),
            _ => Duration::days(7),
        };
        let step = window / (count as i32 + 1);

        let news: Vec<Value> = generate_mock_results(query, count)
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let published = now - step * (i as i32 + 1);
                serde_json::json!({
                    "title": item.title,
                    "url": item.url,
                    "snippet": item.snippet,
                    "published_date": published.to_rfc3339(),
                    "source": host_of(&item.url),
                })
            })
            .collect();

        Ok(serde_json::json!({
            "query": query,
            "total_found": news.len(),
            "news": news,
            "time_range": time_range,
            "timestamp": now.to_rfc3339(),
            "source": "mock_news",
        }))
    }
}

fn host_of(url: &str) -> &str {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or(url)
}
