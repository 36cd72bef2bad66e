//! The orchestration loop.
//!
//! One [`Orchestrator::run`] call owns one conversation and drives it
//! through
//!
//! ```text
//! AwaitingModel ──▶ Answer
//!      │  ▲
//!      ▼  │
//!  ExecutingTools
//! ```
//!
//! until the model answers or the backend-call ceiling is reached.

use std::sync::Arc;
use std::time::Duration;

use toolrelay_config::AppConfig;
use toolrelay_core::backend::{BackendRequest, Usage};
use toolrelay_core::chat::{ChatRequest, ChatResponse, Outcome};
use toolrelay_core::error::{Error, PartialRun, Result};
use toolrelay_core::message::{Conversation, Message, Role};
use toolrelay_core::tool::{RegisteredTool, ToolCallRequest, ToolCallResult, ToolRegistry};
use toolrelay_providers::{BackendRouter, SelectedBackend};
use tracing::{debug, error, info, warn};

use crate::executor::ToolExecutor;
use crate::prompt::build_system_prompt;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Drives chat requests through the backend/tool cycle.
pub struct Orchestrator {
    router: Arc<BackendRouter>,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    max_iterations: u32,
}

enum State {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallRequest>),
    Finished { outcome: Outcome, message: Message },
}

/// Everything one run accumulates.
struct Run {
    conversation: Conversation,
    tool_calls_made: Vec<ToolCallResult>,
    usage: Option<Usage>,
    iterations: u32,
    partial_answer: Option<String>,
    /// Last model name the backend reported, if it reported one.
    served_model: Option<String>,
}

impl Run {
    fn partial(&self) -> PartialRun {
        PartialRun {
            tool_calls_made: self.tool_calls_made.clone(),
            usage: self.usage,
            iterations: self.iterations,
        }
    }

    fn add_usage(&mut self, usage: Option<Usage>) {
        if let Some(u) = usage {
            *self.usage.get_or_insert_with(Usage::default) += u;
        }
    }
}

impl Orchestrator {
    pub fn new(router: Arc<BackendRouter>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            router,
            registry,
            executor: ToolExecutor::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Iteration ceiling and tool timeout taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        router: Arc<BackendRouter>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(router, registry)
            .with_max_iterations(config.max_iterations)
            .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs))
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = ToolExecutor::new(timeout);
        self
    }

    pub fn router(&self) -> &BackendRouter {
        &self.router
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run one chat request to completion.
    ///
    /// Provider and tool resolution fail before any backend call. Backend
    /// failures carry what the run had produced so far.
    pub async fn run(&self, request: ChatRequest) -> Result<ChatResponse> {
        let selected = self.router.select(request.provider.as_deref())?;
        let offered = self
            .registry
            .resolve(request.tools.as_slice())
            .map_err(|e| match e {
                toolrelay_core::ToolError::NotFound(name) => Error::UnknownTool(name),
                other => Error::UnknownTool(other.to_string()),
            })?;

        let model = request
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| selected.default_model.clone());

        info!(
            provider = %selected.name,
            model = %model,
            tools = offered.len(),
            messages = request.messages.len(),
            "Starting chat"
        );

        let response = self.drive(&selected, &model, &offered, request).await?;

        info!(
            provider = %selected.name,
            iterations = response.iterations,
            tool_calls = response.tool_calls_made.len(),
            outcome = ?response.outcome,
            "Chat finished"
        );
        Ok(response)
    }

    async fn drive(
        &self,
        selected: &SelectedBackend,
        model: &str,
        offered: &[RegisteredTool],
        request: ChatRequest,
    ) -> Result<ChatResponse> {
        let backend = &selected.backend;
        let descriptors: Vec<_> = offered.iter().map(|t| t.descriptor().clone()).collect();

        let has_system = request.messages.iter().any(|m| m.role == Role::System);
        let system = (!descriptors.is_empty() && !has_system)
            .then(|| Message::system(build_system_prompt(&descriptors, backend.tool_call_mode())));

        let mut run = Run {
            conversation: Conversation::seeded(system, request.messages),
            tool_calls_made: Vec::new(),
            usage: None,
            iterations: 0,
            partial_answer: None,
            served_model: None,
        };

        let mut state = State::AwaitingModel;
        loop {
            state = match state {
                State::AwaitingModel => {
                    run.iterations += 1;
                    debug!(
                        provider = %selected.name,
                        iteration = run.iterations,
                        max_iterations = self.max_iterations,
                        messages = run.conversation.len(),
                        "Calling backend"
                    );

                    let backend_request = BackendRequest {
                        model: model.to_string(),
                        messages: run.conversation.messages().to_vec(),
                        tools: descriptors.clone(),
                        temperature: request.temperature,
                        max_tokens: request.max_tokens,
                    };

                    let response = match backend.complete(backend_request).await {
                        Ok(response) => response,
                        Err(source) => {
                            error!(
                                provider = %selected.name,
                                iteration = run.iterations,
                                kind = source.kind(),
                                "Backend call failed: {source}"
                            );
                            return Err(Error::Backend {
                                source,
                                partial: run.partial(),
                            });
                        }
                    };

                    run.add_usage(response.usage);
                    if !response.model.is_empty() {
                        run.served_model = Some(response.model.clone());
                    }
                    let text = response.answer.clone().filter(|a| !a.trim().is_empty());
                    if let Some(text) = &text {
                        run.partial_answer = Some(text.clone());
                    }

                    if response.wants_tools() {
                        if run.iterations >= self.max_iterations {
                            warn!(
                                provider = %selected.name,
                                iterations = run.iterations,
                                pending_tool_calls = response.tool_calls.len(),
                                "Iteration limit reached, tool calls not executed"
                            );
                            State::Finished {
                                outcome: Outcome::IterationLimitExceeded,
                                message: Message::assistant(
                                    run.partial_answer.clone().unwrap_or_default(),
                                ),
                            }
                        } else {
                            run.conversation.push(Message::assistant_tool_calls(
                                text.unwrap_or_default(),
                                response.tool_calls.clone(),
                            ));
                            State::ExecutingTools(response.tool_calls)
                        }
                    } else {
                        let answer = text.unwrap_or_else(|| {
                            warn!(provider = %selected.name, "Backend returned an empty answer");
                            String::new()
                        });
                        let message = Message::assistant(answer);
                        run.conversation.push(message.clone());
                        State::Finished {
                            outcome: Outcome::Answer,
                            message,
                        }
                    }
                }

                State::ExecutingTools(calls) => {
                    debug!(count = calls.len(), "Executing tool calls");
                    let results = self.executor.execute_all(offered, calls).await;
                    for result in &results {
                        run.conversation.push(result.to_message());
                    }
                    run.tool_calls_made.extend(results);
                    State::AwaitingModel
                }

                State::Finished { outcome, message } => {
                    return Ok(ChatResponse {
                        success: outcome == Outcome::Answer,
                        outcome,
                        message,
                        tool_calls_made: run.tool_calls_made,
                        usage: run.usage,
                        provider: selected.name.clone(),
                        model: run.served_model.unwrap_or_else(|| model.to_string()),
                        iterations: run.iterations,
                    });
                }
            };
        }
    }
}
