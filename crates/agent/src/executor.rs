//! Tool executor: runs one batch of tool calls and normalizes the outcomes.
//!
//! Calls in a batch run concurrently; results come back in request order.
//! Every failure (unknown tool, bad arguments, tool error, timeout, panic)
//! becomes an error-marker result instead of aborting the batch.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{RegisteredTool, ToolCallRequest, ToolCallResult, ToolOutput};
use tracing::{debug, warn};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

impl ToolExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `requests` against the tools offered for this request.
    ///
    /// A name that is not among `offered` yields an `unknown_tool` marker.
    pub async fn execute_all(
        &self,
        offered: &[RegisteredTool],
        requests: Vec<ToolCallRequest>,
    ) -> Vec<ToolCallResult> {
        let runs = requests.into_iter().map(|request| {
            let tool = offered
                .iter()
                .find(|t| t.name() == request.tool_name)
                .cloned();
            self.execute_one(tool, request)
        });

        join_all(runs).await
    }

    async fn execute_one(
        &self,
        tool: Option<RegisteredTool>,
        request: ToolCallRequest,
    ) -> ToolCallResult {
        let Some(tool) = tool else {
            warn!(tool = %request.tool_name, call_id = %request.call_id, "Model requested an unknown tool");
            let name = request.tool_name.clone();
            return ToolCallResult::new(request, ToolError::NotFound(name));
        };

        debug!(tool = %request.tool_name, call_id = %request.call_id, "Executing tool");
        let started = std::time::Instant::now();

        let run = AssertUnwindSafe(tool.execute(&request.arguments)).catch_unwind();
        let outcome = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ToolError::ExecutionFailed {
                tool_name: request.tool_name.clone(),
                reason: format!("tool panicked: {}", panic_message(panic.as_ref())),
            }),
            Err(_) => Err(ToolError::Timeout {
                tool_name: request.tool_name.clone(),
                timeout_secs: self.timeout.as_secs(),
            }),
        };

        let output = ToolOutput::from(outcome);
        let duration_ms = started.elapsed().as_millis() as u64;
        match &output {
            ToolOutput::Failed { error, kind } => {
                warn!(tool = %request.tool_name, kind = %kind, duration_ms, "Tool failed: {error}");
            }
            ToolOutput::Value(_) => {
                debug!(tool = %request.tool_name, duration_ms, "Tool succeeded");
            }
        }

        ToolCallResult::new(request, output)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{SleepTool, args, registry_with};
    use serde_json::json;
    use toolrelay_core::tool::{ParamType, Tool, ToolDescriptor, ToolParameter};

    struct PanickingTool;

    #[async_trait::async_trait]
    impl Tool for PanickingTool {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "explode".into(),
                description: "Always panics".into(),
                parameters: vec![ToolParameter::optional("x", ParamType::Integer, "ignored")],
            }
        }

        async fn execute(
            &self,
            _arguments: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<serde_json::Value, ToolError> {
            panic!("boom");
        }
    }

    fn call(id: &str, tool: &str, arguments: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest::new(id, tool, args(arguments))
    }

    #[tokio::test]
    async fn results_keep_request_order() {
        let registry = registry_with(vec![Box::new(SleepTool)]);
        let offered = registry.resolve(&["sleep"]).unwrap();

        let results = ToolExecutor::default()
            .execute_all(
                &offered,
                vec![
                    call("call_slow", "sleep", json!({"millis": 80, "label": "slow"})),
                    call("call_fast", "sleep", json!({"millis": 5, "label": "fast"})),
                ],
            )
            .await;

        assert_eq!(results[0].call_id, "call_slow");
        assert_eq!(results[1].call_id, "call_fast");
        assert_eq!(results[0].output, ToolOutput::Value(json!("slow")));
    }

    #[tokio::test]
    async fn batch_runs_concurrently() {
        let registry = registry_with(vec![Box::new(SleepTool)]);
        let offered = registry.resolve(&["sleep"]).unwrap();
        let requests = (0..4)
            .map(|i| call(&format!("call_{i}"), "sleep", json!({"millis": 100, "label": "x"})))
            .collect();

        let started = std::time::Instant::now();
        let results = ToolExecutor::default().execute_all(&offered, requests).await;
        assert_eq!(results.len(), 4);
        assert!(started.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn tool_not_offered_is_unknown() {
        let registry = registry_with(vec![Box::new(SleepTool)]);
        let results = ToolExecutor::default()
            .execute_all(&[], vec![call("call_1", "sleep", json!({"millis": 1}))])
            .await;
        assert!(registry.get("sleep").is_some());
        assert_eq!(
            results[0].output,
            ToolOutput::Failed {
                error: "Tool not found: sleep".into(),
                kind: "unknown_tool".into(),
            }
        );
    }

    #[tokio::test]
    async fn invalid_arguments_become_marker() {
        let registry = registry_with(vec![Box::new(SleepTool)]);
        let offered = registry.resolve(&["sleep"]).unwrap();
        let results = ToolExecutor::default()
            .execute_all(&offered, vec![call("call_1", "sleep", json!({"millis": "soon"}))])
            .await;
        match &results[0].output {
            ToolOutput::Failed { kind, error } => {
                assert_eq!(kind, "invalid_arguments");
                assert!(error.contains("millis"));
            }
            other => panic!("expected error marker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let registry = registry_with(vec![Box::new(SleepTool)]);
        let offered = registry.resolve(&["sleep"]).unwrap();
        let results = ToolExecutor::new(Duration::from_millis(20))
            .execute_all(&offered, vec![call("call_1", "sleep", json!({"millis": 500}))])
            .await;
        match &results[0].output {
            ToolOutput::Failed { kind, .. } => assert_eq!(kind, "timeout"),
            other => panic!("expected timeout marker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let registry = registry_with(vec![Box::new(PanickingTool), Box::new(SleepTool)]);
        let offered = registry.resolve(&["explode", "sleep"]).unwrap();
        let results = ToolExecutor::default()
            .execute_all(
                &offered,
                vec![
                    call("call_1", "explode", json!({})),
                    call("call_2", "sleep", json!({"millis": 1, "label": "ok"})),
                ],
            )
            .await;

        match &results[0].output {
            ToolOutput::Failed { kind, error } => {
                assert_eq!(kind, "execution_failed");
                assert!(error.contains("boom"));
            }
            other => panic!("expected error marker, got {other:?}"),
        }
        assert!(!results[1].is_error());
    }
}
