//! `toolrelay chat`: send one message through the tool loop.

use std::fmt::Write;

use anyhow::Context;
use toolrelay_config::AppConfig;
use toolrelay_core::chat::{ChatRequest, ChatResponse, Outcome};
use toolrelay_core::error::Error;
use toolrelay_core::tool::ToolCallResult;

pub struct ChatOptions {
    pub message: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub json: bool,
}

impl ChatOptions {
    fn to_request(&self, config: &AppConfig) -> ChatRequest {
        let mut request = ChatRequest::user(&self.message).with_tools(&self.tools);
        request.temperature = config.default_temperature;
        request.provider = self.provider.clone();
        request.model = self.model.clone();
        request
    }
}

pub async fn run(config: &AppConfig, options: ChatOptions) -> anyhow::Result<()> {
    let orchestrator = super::build_orchestrator(config)?;
    let request = options.to_request(config);

    match orchestrator.run(request).await {
        Ok(response) => {
            if options.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render(&response));
            }
            Ok(())
        }
        Err(err) => {
            if let Some(partial) = err.partial() {
                if !partial.tool_calls_made.is_empty() {
                    eprint!("{}", render_tool_calls(&partial.tool_calls_made));
                }
            }
            if let Error::ProviderNotConfigured { .. } = &err {
                eprintln!("Run `toolrelay providers` to see which providers are ready.");
            }
            Err(err).context("Chat failed")
        }
    }
}

fn render(response: &ChatResponse) -> String {
    let mut out = String::new();
    if !response.tool_calls_made.is_empty() {
        out.push_str(&render_tool_calls(&response.tool_calls_made));
        out.push('\n');
    }

    if response.outcome == Outcome::IterationLimitExceeded {
        let _ = writeln!(
            out,
            "Stopped after {} iterations without a final answer.",
            response.iterations
        );
    }
    if !response.message.content.is_empty() {
        let _ = writeln!(out, "{}", response.message.content);
    }

    let _ = write!(
        out,
        "\n[{} / {} | {} iteration{}",
        response.provider,
        response.model,
        response.iterations,
        if response.iterations == 1 { "" } else { "s" }
    );
    if let Some(usage) = &response.usage {
        let _ = write!(out, " | {} tokens", usage.total_tokens);
    }
    out.push_str("]\n");
    out
}

fn render_tool_calls(calls: &[ToolCallResult]) -> String {
    let mut out = String::new();
    for call in calls {
        let arguments = serde_json::Value::Object(call.arguments.clone());
        let status = if call.is_error() { "error" } else { "ok" };
        let _ = writeln!(
            out,
            "  > {}({}) [{status}] {}",
            call.tool_name,
            arguments,
            call.output.to_content()
        );
    }
    out
}
