//! OpenAI-compatible backend.
//!
//! DeepInfra, OpenAI and Ollama all expose `/chat/completions` in the
//! OpenAI wire format; one adapter type covers all three, configured per
//! provider (base URL, key, tool-call mode).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use toolrelay_core::backend::{BackendRequest, BackendResponse, ModelBackend, ToolCallMode, Usage};
use toolrelay_core::error::BackendError;
use toolrelay_core::message::{Message, Role};
use toolrelay_core::tool::{ToolCallRequest, ToolDescriptor};
use tracing::{debug, trace, warn};

use crate::prompted;

pub const DEEPINFRA_BASE_URL: &str = "https://api.deepinfra.com/v1/openai";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEEPINFRA_MODELS: &[&str] = &[
    "meta-llama/Llama-3.3-70B-Instruct-Turbo",
    "meta-llama/Llama-3.1-8B-Instruct",
    "Qwen/Qwen2.5-72B-Instruct",
];

pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"];

pub const OLLAMA_MODELS: &[&str] = &["llama3.1", "qwen2.5", "mistral"];

/// A backend speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    tool_call_mode: ToolCallMode,
    models: Vec<String>,
}

impl OpenAiCompatBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(DEFAULT_TIMEOUT_SECS),
            tool_call_mode: ToolCallMode::Native,
            models: Vec::new(),
        }
    }

    /// DeepInfra's OpenAI-compatible endpoint.
    pub fn deepinfra(api_key: impl Into<String>) -> Self {
        Self::new("deepinfra", DEEPINFRA_BASE_URL, api_key).with_models(DEEPINFRA_MODELS)
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", OPENAI_BASE_URL, api_key).with_models(OPENAI_MODELS)
    }

    /// A local Ollama server. `base_url` is the server root; `/v1` is appended.
    pub fn ollama(base_url: Option<&str>) -> Self {
        let root = base_url.unwrap_or(OLLAMA_BASE_URL).trim_end_matches('/');
        let url = if root.ends_with("/v1") {
            root.to_string()
        } else {
            format!("{root}/v1")
        };
        // Ollama ignores the key but the wire format wants one.
        Self::new("ollama", url, "ollama").with_models(OLLAMA_MODELS)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client = build_client(timeout_secs);
        self
    }

    pub fn with_tool_call_mode(mut self, mode: ToolCallMode) -> Self {
        self.tool_call_mode = mode;
        self
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the JSON body for `/chat/completions`.
    fn request_body(&self, request: &BackendRequest) -> Value {
        let messages = match self.tool_call_mode {
            ToolCallMode::Native => Self::to_api_messages(&request.messages),
            ToolCallMode::Prompted => {
                Self::to_api_messages(&prompted::render_messages(&request.messages))
            }
        };

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if self.tool_call_mode == ToolCallMode::Native && !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Vec<ApiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.call_id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.tool_name.clone(),
                            arguments: Value::Object(tc.arguments.clone()).to_string(),
                        },
                    })
                    .collect();

                let content = if m.role == Role::Assistant
                    && !tool_calls.is_empty()
                    && m.content.is_empty()
                {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: m.role.as_str().into(),
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool descriptors to OpenAI API format.
    fn to_api_tools(tools: &[ToolDescriptor]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.json_schema(),
                },
            })
            .collect()
    }

    /// Turn a 200 response body into a [`BackendResponse`].
    fn parse_completion(&self, body: &str) -> Result<BackendResponse, BackendError> {
        let api_response: ApiResponse = serde_json::from_str(body).map_err(|e| {
            BackendError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::MalformedResponse("No choices in response".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let content = choice.message.content.filter(|c| !c.is_empty());

        let mut tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = parse_arguments(&tc.function.name, &tc.function.arguments)?;
                Ok(ToolCallRequest::new(tc.id, tc.function.name, arguments))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        let mut answer = content;
        if tool_calls.is_empty() && self.tool_call_mode == ToolCallMode::Prompted {
            if let Some(parsed) = answer.as_deref().and_then(prompted::parse_tool_call) {
                trace!(tool = %parsed.call.tool_name, "Parsed prompted tool call");
                tool_calls.push(parsed.call);
                answer = parsed.prose;
            }
        }

        Ok(BackendResponse {
            answer,
            tool_calls,
            usage,
            model: api_response.model.unwrap_or_default(),
        })
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Native tool arguments arrive as a JSON-encoded string.
fn parse_arguments(tool_name: &str, raw: &str) -> Result<Map<String, Value>, BackendError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(BackendError::MalformedResponse(format!(
            "Arguments for tool '{tool_name}' are not an object: {other}"
        ))),
        Err(e) => Err(BackendError::MalformedResponse(format!(
            "Arguments for tool '{tool_name}' are not valid JSON: {e}"
        ))),
    }
}

/// Map a non-200 status to a backend error.
fn status_error(status: u16, retry_after_secs: Option<u64>, body: String) -> BackendError {
    match status {
        401 | 403 => BackendError::Authentication(if body.is_empty() {
            "Invalid API key or insufficient permissions".into()
        } else {
            body
        }),
        429 => BackendError::QuotaExceeded {
            message: body,
            retry_after_secs,
        },
        _ => BackendError::Api {
            status_code: status,
            message: body,
        },
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        self.tool_call_mode
    }

    fn available_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn complete(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(provider = %self.name, status, body = %text, "Provider returned error");
            return Err(status_error(status, retry_after, text));
        }

        let parsed = self.parse_completion(&text)?;
        let usage = parsed.usage;
        debug!(
            provider = %self.name,
            model = %parsed.model,
            tool_calls = parsed.tool_calls.len(),
            prompt_tokens = usage.map(|u| u.prompt_tokens),
            completion_tokens = usage.map(|u| u.completion_tokens),
            total_tokens = usage.map(|u| u.total_tokens),
            "Completion received"
        );
        Ok(parsed)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use toolrelay_core::tool::{ParamType, ToolParameter};

    fn request(tools: Vec<ToolDescriptor>) -> BackendRequest {
        BackendRequest {
            model: "test-model".into(),
            messages: vec![Message::user("What is 25*17+33?")],
            tools,
            temperature: 0.2,
            max_tokens: Some(128),
        }
    }

    fn calculator_descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "calculator".into(),
            description: "Evaluate arithmetic".into(),
            parameters: vec![ToolParameter::required(
                "expression",
                ParamType::String,
                "Expression to evaluate",
            )],
        }
    }

    /// Serve `app` on an ephemeral port and return its base URL.
    async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn deepinfra_constructor() {
        let backend = OpenAiCompatBackend::deepinfra("di-test");
        assert_eq!(backend.name(), "deepinfra");
        assert_eq!(backend.base_url(), DEEPINFRA_BASE_URL);
        assert_eq!(backend.available_models().len(), 3);
    }

    #[test]
    fn ollama_constructor_appends_v1() {
        let backend = OpenAiCompatBackend::ollama(None);
        assert_eq!(backend.base_url(), "http://localhost:11434/v1");

        let backend = OpenAiCompatBackend::ollama(Some("http://gpu:11434/v1/"));
        assert_eq!(backend.base_url(), "http://gpu:11434/v1");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let call = ToolCallRequest::new(
            "call_1",
            "calculator",
            serde_json::json!({"expression": "2+2"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let messages = vec![
            Message::system("You are helpful"),
            Message::assistant_tool_calls("", vec![call]),
            Message::tool_result("call_1", "calculator", "{\"result\":4}"),
        ];
        let api = OpenAiCompatBackend::to_api_messages(&messages);
        assert_eq!(api[0].role, "system");
        assert!(api[1].content.is_none());
        let tc = api[1].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "calculator");
        assert_eq!(tc[0].function.arguments, r#"{"expression":"2+2"}"#);
        assert_eq!(api[2].role, "tool");
        assert_eq!(api[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn native_body_carries_tools() {
        let backend = OpenAiCompatBackend::openai("sk-test");
        let body = backend.request_body(&request(vec![calculator_descriptor()]));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "calculator");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["required"][0],
            "expression"
        );
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn prompted_body_omits_tools() {
        let backend =
            OpenAiCompatBackend::ollama(None).with_tool_call_mode(ToolCallMode::Prompted);
        let body = backend.request_body(&request(vec![calculator_descriptor()]));
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parse_native_tool_calls() {
        let backend = OpenAiCompatBackend::openai("sk-test");
        let body = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_a", "type": "function", "function": {"name": "calculator", "arguments": "{\"expression\": \"25*17+33\"}"}}
            ]}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        }"#;
        let resp = backend.parse_completion(body).unwrap();
        assert!(resp.answer.is_none());
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].call_id, "call_a");
        assert_eq!(resp.tool_calls[0].arguments["expression"], "25*17+33");
        assert_eq!(resp.usage.unwrap().total_tokens, 20);
        assert_eq!(resp.model, "gpt-4o-mini");
    }

    #[test]
    fn unparseable_tool_arguments_are_malformed() {
        let backend = OpenAiCompatBackend::openai("sk-test");
        let body = r#"{"model": "m", "choices": [{"message": {"role": "assistant", "tool_calls": [
            {"id": "call_a", "type": "function", "function": {"name": "calculator", "arguments": "{not json"}}
        ]}}]}"#;
        let err = backend.parse_completion(body).unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[test]
    fn empty_choices_are_malformed() {
        let backend = OpenAiCompatBackend::openai("sk-test");
        let err = backend
            .parse_completion(r#"{"model": "m", "choices": []}"#)
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));

        let err = backend.parse_completion("<html>oops</html>").unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[test]
    fn prompted_reply_becomes_tool_call() {
        let backend =
            OpenAiCompatBackend::ollama(None).with_tool_call_mode(ToolCallMode::Prompted);
        let content = serde_json::json!({
            "tool_call": {"name": "calculator", "arguments": {"expression": "2+2"}}
        })
        .to_string();
        let body = serde_json::json!({
            "model": "llama3.1",
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string();

        let resp = backend.parse_completion(&body).unwrap();
        assert!(resp.wants_tools());
        assert_eq!(resp.tool_calls[0].tool_name, "calculator");
        assert!(resp.answer.is_none());
    }

    #[test]
    fn native_mode_ignores_json_in_text() {
        let backend = OpenAiCompatBackend::openai("sk-test");
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant",
                "content": "{\"tool_call\": {\"name\": \"calculator\", \"arguments\": {}}}"}}]
        })
        .to_string();
        let resp = backend.parse_completion(&body).unwrap();
        assert!(!resp.wants_tools());
        assert!(resp.answer.is_some());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            status_error(401, None, String::new()),
            BackendError::Authentication(_)
        ));
        assert!(matches!(
            status_error(403, None, "forbidden".into()),
            BackendError::Authentication(_)
        ));
        assert_eq!(
            status_error(429, Some(7), "slow down".into()),
            BackendError::QuotaExceeded {
                message: "slow down".into(),
                retry_after_secs: Some(7),
            }
        );
        assert!(matches!(
            status_error(500, None, "boom".into()),
            BackendError::Api { status_code: 500, .. }
        ));
    }

    #[tokio::test]
    async fn complete_against_local_server() {
        let app = axum::Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, body: axum::Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-local");
                assert_eq!(body["model"], "test-model");
                axum::Json(serde_json::json!({
                    "model": "test-model",
                    "choices": [{"message": {"role": "assistant", "content": "458"}}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
                }))
            }),
        );
        let url = serve(app).await;

        let backend = OpenAiCompatBackend::new("local", url, "sk-local");
        let resp = backend.complete(request(Vec::new())).await.unwrap();
        assert_eq!(resp.answer.as_deref(), Some("458"));
        assert_eq!(resp.usage.unwrap().total_tokens, 6);
    }

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn completion_log_carries_token_usage() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = axum::Router::new().route(
            "/chat/completions",
            post(|| async {
                axum::Json(serde_json::json!({
                    "model": "test-model",
                    "choices": [{"message": {"role": "assistant", "content": "ok"}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
                }))
            }),
        );
        let url = serve(app).await;

        let backend = OpenAiCompatBackend::new("local", url, "sk-local");
        backend.complete(request(Vec::new())).await.unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("Completion received"))
            .unwrap();
        assert!(line.contains("prompt_tokens=12"));
        assert!(line.contains("completion_tokens=3"));
        assert!(line.contains("total_tokens=15"));
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let app = axum::Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", "12")],
                    "quota exhausted",
                )
                    .into_response()
            }),
        );
        let url = serve(app).await;

        let backend = OpenAiCompatBackend::new("local", url, "k");
        let err = backend.complete(request(Vec::new())).await.unwrap_err();
        assert_eq!(
            err,
            BackendError::QuotaExceeded {
                message: "quota exhausted".into(),
                retry_after_secs: Some(12),
            }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let backend = OpenAiCompatBackend::new("local", "http://127.0.0.1:1", "k").with_timeout(2);
        let err = backend.complete(request(Vec::new())).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
