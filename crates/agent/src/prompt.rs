//! System prompt synthesized for requests that offer tools.

use std::fmt::Write;

use toolrelay_core::backend::ToolCallMode;
use toolrelay_core::tool::ToolDescriptor;

const BASE_PROMPT: &str = "You are a helpful assistant with access to tools. \
Use a tool when it helps you answer accurately; otherwise answer directly.";

/// Build the system message text describing `tools`.
///
/// Prompted backends also get the JSON reply format, since no tool schema
/// travels on the wire for them.
pub fn build_system_prompt(tools: &[ToolDescriptor], mode: ToolCallMode) -> String {
    let mut prompt = String::from(BASE_PROMPT);
    if tools.is_empty() {
        return prompt;
    }

    prompt.push_str("\n\n## Available tools\n");
    for tool in tools {
        let _ = write!(prompt, "\n### {}\n{}\n", tool.name, tool.description);
        if !tool.parameters.is_empty() {
            prompt.push_str("Parameters:\n");
            for param in &tool.parameters {
                let _ = writeln!(
                    prompt,
                    "  - {} ({}, {}): {}",
                    param.name,
                    param.param_type.as_str(),
                    if param.required { "required" } else { "optional" },
                    param.description
                );
            }
        }
    }

    if mode == ToolCallMode::Prompted {
        prompt.push_str(
            "\n## How to use a tool\n\
             To call a tool, reply with only this JSON object and nothing else:\n\
             ```json\n\
             {\"tool_call\": {\"name\": \"tool_name\", \"arguments\": {\"param\": \"value\"}}}\n\
             ```\n\
             You will receive the tool result in the next message. Call one tool at a time. \
             When you have enough information, answer in plain text without JSON.\n",
        );
    }

    prompt
}
