//! Error types for the toolrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what the
//! orchestrator surfaces to its caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::Usage;
use crate::tool::ToolCallResult;

/// The top-level error type for an orchestration run.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested provider name is not one this process knows about.
    #[error("Unknown provider: {name}. Available: {}", available.join(", "))]
    UnknownProvider { name: String, available: Vec<String> },

    /// The provider is known but lacks the configuration it needs (API key).
    #[error("Provider '{name}' is not configured: {hint}")]
    ProviderNotConfigured { name: String, hint: String },

    /// A tool named in the request's tool list is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model backend failed. Carries whatever the run produced before
    /// the failure.
    #[error("Provider error: {source}")]
    Backend {
        #[source]
        source: BackendError,
        partial: PartialRun,
    },
}

impl Error {
    /// Stable machine-readable kind, used in API error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownProvider { .. } => "unknown_provider",
            Error::ProviderNotConfigured { .. } => "provider_not_configured",
            Error::UnknownTool(_) => "unknown_tool",
            Error::Backend { source, .. } => source.kind(),
        }
    }

    /// The partial run attached to a backend failure, if any.
    pub fn partial(&self) -> Option<&PartialRun> {
        match self {
            Error::Backend { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// What an orchestration run had accomplished when it was cut short.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialRun {
    /// Tool calls executed before the failure, in execution order.
    pub tool_calls_made: Vec<ToolCallResult>,

    /// Usage summed over the backend calls that succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Backend calls attempted, including the failed one.
    pub iterations: u32,
}

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Quota or rate limit exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },
}

impl BackendError {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Authentication(_) => "provider_auth",
            BackendError::QuotaExceeded { .. } => "provider_quota",
            BackendError::MalformedResponse(_) => "provider_malformed_response",
            BackendError::Transport(_) => "provider_transport",
            BackendError::Api { .. } => "provider_api",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid argument '{parameter}' for {tool_name}: {reason}")]
    InvalidArguments {
        tool_name: String,
        parameter: String,
        reason: String,
    },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "unknown_tool",
            ToolError::Duplicate(_) => "duplicate_tool",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::ExecutionFailed { .. } => "execution_failed",
            ToolError::Timeout { .. } => "timeout",
        }
    }
}
