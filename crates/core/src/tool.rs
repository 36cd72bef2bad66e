//! Tool trait: the abstraction over locally executable capabilities.
//!
//! Tools are what let the model act: evaluate arithmetic, search the web,
//! fetch a page. Each tool declares its parameters once; arguments coming
//! back from the model are checked against that declaration before the
//! tool ever runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::message::Message;

/// Type tag of a declared tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Whether a JSON value is acceptable for this type.
    ///
    /// Integers satisfy `number`; whole floats (`5.0`) satisfy `integer`.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    pub description: String,

    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ToolParameter {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Declarative description of a tool, shown to callers and to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    /// Render the parameters as a JSON Schema object (function-calling format).
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check arguments against the declared parameters.
    ///
    /// Fails on the first missing required or wrongly typed parameter.
    /// Arguments that are not declared are ignored.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), ToolError> {
        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(self.invalid(param, "missing required argument".into()));
                    }
                }
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(self.invalid(
                        param,
                        format!(
                            "expected {}, got {}",
                            param.param_type.as_str(),
                            json_type_name(value)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn invalid(&self, param: &ToolParameter, reason: String) -> ToolError {
        ToolError::InvalidArguments {
            tool_name: self.name.clone(),
            parameter: param.name.clone(),
            reason,
        }
    }
}

/// A request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique within one backend response (matches the LLM's tool_call.id)
    pub call_id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments by parameter name
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What a tool call produced: a value, or an error marker the model can read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Failed { error: String, kind: String },
    Value(Value),
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Failed { .. })
    }

    /// Text placed in the tool-role message content.
    pub fn to_content(&self) -> String {
        match self {
            ToolOutput::Value(Value::String(s)) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        ToolOutput::Failed {
            error: err.to_string(),
            kind: err.kind().into(),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolOutput {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(value) => ToolOutput::Value(value),
            Err(err) => err.into(),
        }
    }
}

/// The outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,

    #[serde(rename = "tool")]
    pub tool_name: String,

    pub arguments: Map<String, Value>,

    #[serde(rename = "result")]
    pub output: ToolOutput,
}

impl ToolCallResult {
    pub fn new(request: ToolCallRequest, output: impl Into<ToolOutput>) -> Self {
        Self {
            call_id: request.call_id,
            tool_name: request.tool_name,
            arguments: request.arguments,
            output: output.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.output.is_error()
    }

    /// The tool-role message that reports this result back to the model.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.tool_name, self.output.to_content())
    }
}

/// The core Tool trait.
///
/// Each tool (calculator, web_search, ...) implements this trait and is
/// registered once at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's declaration. Must be pure.
    fn describe(&self) -> ToolDescriptor;

    /// Execute with arguments that already passed [`ToolDescriptor::validate`].
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// A tool together with the descriptor captured at registration.
#[derive(Clone)]
pub struct RegisteredTool {
    descriptor: ToolDescriptor,
    tool: Arc<dyn Tool>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Validate the arguments, then run the tool.
    pub async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        self.descriptor.validate(arguments)?;
        self.tool.execute(arguments).await
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.descriptor.name)
            .finish()
    }
}

/// A registry of available tools.
///
/// Populated once at startup, then shared read-only across requests.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A name that is already taken is rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let descriptor = tool.describe();
        if self.index.contains_key(&descriptor.name) {
            return Err(ToolError::Duplicate(descriptor.name));
        }
        tracing::debug!(tool = %descriptor.name, "Registered tool");
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            tool: Arc::from(tool),
        });
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Look up every name, in order. Fails on the first unknown name.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<RegisteredTool>, ToolError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .cloned()
                    .ok_or_else(|| ToolError::NotFound(name.to_string()))
            })
            .collect()
    }

    /// Every registered tool, in registration order.
    pub fn list_all(&self) -> &[RegisteredTool] {
        &self.tools
    }

    /// Every descriptor, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
