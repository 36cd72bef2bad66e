//! Text-based tool calling for models without native function calling.
//!
//! The model is told (via the system prompt) to reply with
//!
//! ```json
//! {"tool_call": {"name": "calculator", "arguments": {"expression": "2+2"}}}
//! ```
//!
//! This module finds that object in a reply and renders tool traffic back
//! into plain user/assistant turns.

use serde_json::{Map, Value};
use toolrelay_core::{Message, Role, ToolCallRequest};

/// A tool call found in reply text, plus whatever prose surrounded it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub call: ToolCallRequest,
    pub prose: Option<String>,
}

/// Look for a `{"tool_call": ...}` object in `text`.
///
/// Tried in order: the whole reply, fenced ```json blocks, then any
/// embedded JSON object.
pub fn parse_tool_call(text: &str) -> Option<ParsedToolCall> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(call) = tool_call_from_value(&value) {
            return Some(ParsedToolCall { call, prose: None });
        }
    }

    for (span, body) in fenced_blocks(text) {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            if let Some(call) = tool_call_from_value(&value) {
                return Some(ParsedToolCall {
                    call,
                    prose: prose_around(text, span),
                });
            }
        }
    }

    for (start, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if let Some(call) = tool_call_from_value(&value) {
                let end = start + stream.byte_offset();
                return Some(ParsedToolCall {
                    call,
                    prose: prose_around(text, (start, end)),
                });
            }
        }
    }

    None
}

fn tool_call_from_value(value: &Value) -> Option<ToolCallRequest> {
    let call = value.get("tool_call")?.as_object()?;
    let name = call.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match call.get("arguments") {
        Some(Value::Object(map)) => map.clone(),
        // Some models double-encode the arguments.
        Some(Value::String(raw)) => serde_json::from_str::<Map<String, Value>>(raw).unwrap_or_default(),
        _ => Map::new(),
    };

    Some(ToolCallRequest::new(new_call_id(), name, arguments))
}

/// Byte spans of ```json fenced blocks: (whole block span, inner body).
fn fenced_blocks(text: &str) -> Vec<((usize, usize), &str)> {
    const OPEN: &str = "```json";
    const CLOSE: &str = "```";

    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = text[cursor..].find(OPEN) {
        let start = cursor + rel;
        let body_start = start + OPEN.len();
        let Some(close_rel) = text[body_start..].find(CLOSE) else {
            break;
        };
        let body_end = body_start + close_rel;
        let end = body_end + CLOSE.len();
        blocks.push(((start, end), text[body_start..body_end].trim()));
        cursor = end;
    }
    blocks
}

fn prose_around(text: &str, (start, end): (usize, usize)) -> Option<String> {
    let before = text[..start].trim();
    let after = text[end..].trim();
    let prose = match (before.is_empty(), after.is_empty()) {
        (true, true) => return None,
        (false, true) => before.to_string(),
        (true, false) => after.to_string(),
        (false, false) => format!("{before}\n{after}"),
    };
    Some(prose)
}

/// A fresh call id for a parsed tool call.
pub fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Rewrite a conversation so it only uses system/user/assistant turns.
///
/// Assistant tool calls become the JSON object the model is asked to emit;
/// tool results become user turns quoting the result.
pub fn render_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| match m.role {
            Role::Tool => Message::user(format_tool_result(
                m.name.as_deref().unwrap_or("tool"),
                &m.content,
            )),
            Role::Assistant if !m.tool_calls.is_empty() => {
                let calls: Vec<String> = m
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "tool_call": { "name": tc.tool_name, "arguments": tc.arguments }
                        })
                        .to_string()
                    })
                    .collect();
                let mut content = m.content.trim().to_string();
                for call in calls {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&call);
                }
                Message::assistant(content)
            }
            _ => m.clone(),
        })
        .collect()
}

/// The user turn that reports a tool result to a prompted model.
pub fn format_tool_result(tool_name: &str, content: &str) -> String {
    format!(
        "Tool '{tool_name}' returned:\n```json\n{content}\n```\n\
         Use this result to answer the original question. \
         Call another tool only if you still need more information."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_reply() {
        let text = r#"{"tool_call": {"name": "calculator", "arguments": {"expression": "25*17+33"}}}"#;
        let parsed = parse_tool_call(text).unwrap();
        assert_eq!(parsed.call.tool_name, "calculator");
        assert_eq!(parsed.call.arguments["expression"], "25*17+33");
        assert!(parsed.call.call_id.starts_with("call_"));
        assert!(parsed.prose.is_none());
    }

    #[test]
    fn parses_fenced_block_and_keeps_prose() {
        let text = "Let me compute that.\n```json\n{\"tool_call\": {\"name\": \"calculator\", \"arguments\": {\"expression\": \"2+2\"}}}\n```";
        let parsed = parse_tool_call(text).unwrap();
        assert_eq!(parsed.call.tool_name, "calculator");
        assert_eq!(parsed.prose.as_deref(), Some("Let me compute that."));
    }

    #[test]
    fn parses_embedded_object() {
        let text = r#"Sure! {"tool_call": {"name": "web_search", "arguments": {"query": "rust"}}} one moment"#;
        let parsed = parse_tool_call(text).unwrap();
        assert_eq!(parsed.call.tool_name, "web_search");
        assert_eq!(parsed.prose.as_deref(), Some("Sure!\none moment"));
    }

    #[test]
    fn string_encoded_arguments_are_decoded() {
        let text = r#"{"tool_call": {"name": "calculator", "arguments": "{\"expression\": \"1+1\"}"}}"#;
        let parsed = parse_tool_call(text).unwrap();
        assert_eq!(parsed.call.arguments["expression"], "1+1");
    }

    #[test]
    fn plain_answer_is_not_a_tool_call() {
        assert!(parse_tool_call("The answer is 458.").is_none());
        assert!(parse_tool_call("").is_none());
        assert!(parse_tool_call(r#"{"answer": 4}"#).is_none());
        assert!(parse_tool_call(r#"{"tool_call": {"arguments": {}}}"#).is_none());
    }

    #[test]
    fn each_parse_gets_a_fresh_id() {
        let text = r#"{"tool_call": {"name": "calculator", "arguments": {}}}"#;
        let a = parse_tool_call(text).unwrap();
        let b = parse_tool_call(text).unwrap();
        assert_ne!(a.call.call_id, b.call.call_id);
    }

    #[test]
    fn render_rewrites_tool_traffic() {
        let call = ToolCallRequest::new(
            "call_1",
            "calculator",
            serde_json::json!({"expression": "2+2"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let messages = vec![
            Message::user("What is 2+2?"),
            Message::assistant_tool_calls("", vec![call]),
            Message::tool_result("call_1", "calculator", r#"{"result":4}"#),
        ];

        let rendered = render_messages(&messages);
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[1].role, Role::Assistant);
        assert!(rendered[1].tool_calls.is_empty());
        assert!(rendered[1].content.contains("\"tool_call\""));
        assert_eq!(rendered[2].role, Role::User);
        assert!(rendered[2].content.contains("Tool 'calculator' returned"));
        assert!(rendered[2].content.contains(r#"{"result":4}"#));
    }
}
