//! Inbound chat requests and the responses the orchestrator returns.

use serde::{Deserialize, Serialize};

use crate::backend::Usage;
use crate::message::Message;
use crate::tool::ToolCallResult;

/// A validated chat request handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,

    /// Provider name (deepinfra, openai, ollama); the configured default if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Names of the tools the model may use.
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    /// A single user message with no tools.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            provider: None,
            model: None,
            tools: Vec::new(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// How an orchestration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The model produced a final answer.
    Answer,
    /// The iteration ceiling was reached while the model still wanted tools.
    IterationLimitExceeded,
}

/// The result of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,

    pub outcome: Outcome,

    /// The final assistant message. For an iteration-limit outcome its
    /// content is the best partial answer seen, possibly empty.
    pub message: Message,

    /// Every tool call executed during the run, in order.
    #[serde(default)]
    pub tool_calls_made: Vec<ToolCallResult>,

    /// Usage summed across all backend calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    pub provider: String,

    pub model: String,

    /// Number of backend calls made.
    pub iterations: u32,
}
