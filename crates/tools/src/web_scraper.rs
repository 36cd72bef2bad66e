//! Web scraper tool: fetches a page and returns its readable text.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use toolrelay_config::ScrapingConfig;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{ParamType, Tool, ToolDescriptor, ToolParameter};
use tracing::debug;
use url::Url;

const NAME: &str = "web_scraper";

pub struct WebScraperTool {
    enabled: bool,
    max_content_chars: usize,
    client: reqwest::Client,
}

impl WebScraperTool {
    pub fn new(config: &ScrapingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            enabled: config.enabled,
            max_content_chars: config.max_content_chars,
            client,
        }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.into(),
            description: "Fetch a web page by URL and return its title and text content. \
                          Use when you have an exact URL and need the page text."
                .into(),
            parameters: vec![
                ToolParameter::required(
                    "url",
                    ParamType::String,
                    "Full page URL, starting with http:// or https://",
                ),
                ToolParameter::optional(
                    "max_chars",
                    ParamType::Integer,
                    "Maximum characters of content to return",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let raw_url = arguments
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let url = parse_page_url(raw_url)?;

        if !self.enabled {
            return Err(Self::failed("web scraping is disabled by configuration"));
        }

        let max_chars = arguments
            .get("max_chars")
            .and_then(Value::as_u64)
            .map(|n| (n as usize).clamp(1, self.max_content_chars))
            .unwrap_or(self.max_content_chars);

        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Self::failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failed(format!("HTTP {} from {url}", status.as_u16())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Self::failed(format!("failed to read body: {e}")))?;

        let page = PageText::extract(&html);
        let truncated = page.content.chars().count() > max_chars;
        let content: String = page.content.chars().take(max_chars).collect();

        Ok(serde_json::json!({
            "url": url.as_str(),
            "status": status.as_u16(),
            "title": page.title,
            "content": content,
            "truncated": truncated,
        }))
    }
}

fn parse_page_url(raw: &str) -> Result<Url, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool_name: NAME.into(),
        parameter: "url".into(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(format!("not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("URL must start with http:// or https://".into()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("URL has no host".into()));
    }
    Ok(url)
}

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "head", "noscript", "template"];

/// Readable text of an HTML page.
struct PageText {
    title: String,
    content: String,
}

impl PageText {
    fn extract(html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = Selector::parse("title")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|el| el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        let root = Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .unwrap_or_else(|| document.root_element());

        let mut words: Vec<&str> = Vec::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if !hidden {
                words.extend(text.split_whitespace());
            }
        }

        Self {
            title,
            content: words.join(" "),
        }
    }
}
