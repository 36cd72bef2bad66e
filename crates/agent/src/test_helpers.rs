//! Shared test helpers for executor and orchestrator tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};
use toolrelay_core::backend::{BackendRequest, BackendResponse, ModelBackend, ToolCallMode, Usage};
use toolrelay_core::error::{BackendError, ToolError};
use toolrelay_core::tool::{ParamType, Tool, ToolCallRequest, ToolDescriptor, ToolParameter, ToolRegistry};
use toolrelay_providers::BackendRouter;

/// A backend that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next entry and records the request.
/// Panics if more calls are made than responses provided.
pub struct ScriptedBackend {
    responses: Mutex<Vec<Result<BackendResponse, BackendError>>>,
    requests: Mutex<Vec<BackendRequest>>,
    call_count: Mutex<usize>,
    mode: ToolCallMode,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<BackendResponse, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
            mode: ToolCallMode::Native,
        }
    }

    pub fn ok(responses: Vec<BackendResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn with_mode(mut self, mode: ToolCallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        self.mode
    }

    async fn complete(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "ScriptedBackend: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        self.requests.lock().unwrap().push(request);
        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

pub fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A final answer with no tool calls.
pub fn answer(text: &str) -> BackendResponse {
    BackendResponse {
        answer: Some(text.into()),
        tool_calls: Vec::new(),
        usage: Some(usage()),
        model: "mock-model".into(),
    }
}

/// A response asking for tool calls, with optional accompanying text.
pub fn tool_calls(calls: Vec<ToolCallRequest>, text: Option<&str>) -> BackendResponse {
    BackendResponse {
        answer: text.map(String::from),
        tool_calls: calls,
        usage: Some(usage()),
        model: "mock-model".into(),
    }
}

pub fn call(id: &str, tool: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, tool, args(arguments))
}

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn registry_with(tools: Vec<Box<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    registry
}

/// A router whose default provider is `backend`.
pub fn router_with(backend: Arc<ScriptedBackend>) -> BackendRouter {
    let mut router = BackendRouter::new("scripted");
    router.register("scripted", backend, "mock-model");
    router
}

/// Sleeps for `millis`, then returns `label`.
pub struct SleepTool;

#[async_trait::async_trait]
impl Tool for SleepTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "sleep".into(),
            description: "Sleep, then echo a label".into(),
            parameters: vec![
                ToolParameter::required("millis", ParamType::Integer, "How long to sleep"),
                ToolParameter::optional("label", ParamType::String, "Returned value"),
            ],
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let millis = arguments.get("millis").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(arguments.get("label").cloned().unwrap_or(Value::Null))
    }
}
