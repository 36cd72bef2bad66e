//! ModelBackend trait: the abstraction over LLM providers.
//!
//! A backend knows how to send a conversation (plus an optional tool
//! catalog) to one provider and turn the reply into either an answer or a
//! list of tool calls.
//!
//! Implementations: OpenAI-compatible endpoints (DeepInfra, OpenAI, Ollama).

use std::ops::AddAssign;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::Message;
use crate::tool::{ToolCallRequest, ToolDescriptor};

/// One call to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The conversation so far
    pub messages: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,

    /// Temperature (0.0 = deterministic, 2.0 = very creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// What a backend answered.
///
/// A non-empty `tool_calls` means the loop continues; otherwise `answer`
/// is the final text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    #[serde(default)]
    pub model: String,
}

impl BackendResponse {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Sums saturate at `u32::MAX`; a long run reports a pinned count rather
/// than panicking or wrapping.
impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// How a backend exchanges tool calls with its model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    /// Structured function calling in the provider's wire format.
    #[default]
    Native,
    /// Tool calls written as JSON inside the reply text.
    Prompted,
}

/// The core backend trait.
///
/// The orchestrator calls `complete()` without knowing which provider is
/// behind it.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "deepinfra", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;

    /// How this backend carries tool calls.
    fn tool_call_mode(&self) -> ToolCallMode {
        ToolCallMode::Native
    }

    /// Models this backend is known to serve.
    fn available_models(&self) -> Vec<String> {
        Vec::new()
    }
}
