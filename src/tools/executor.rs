//! Tool execution
//!
//! Turns one `ToolCallRequest` into exactly one `ToolResult`. Nothing here
//! raises: unknown tools, bad arguments, timeouts and panics all come back
//! as an error-tagged result.

use super::{ToolContext, ToolError, ToolRegistry};
use crate::conversation::{ToolCallRequest, ToolResult};
use crate::llm::ToolDefinition;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Runs tool calls against the registry with a per-call time budget
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
    budget: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, ctx: ToolContext, budget: Duration) -> Self {
        Self {
            registry,
            ctx,
            budget,
        }
    }

    /// Tool definitions for the model request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub async fn execute(&self, request: &ToolCallRequest) -> ToolResult {
        let start = Instant::now();
        match self.try_execute(request).await {
            Ok(output) => {
                tracing::info!(
                    tool = %request.tool_name,
                    id = %request.id,
                    duration_ms = %start.elapsed().as_millis(),
                    "Tool completed"
                );
                ToolResult::success(&request.id, output)
            }
            Err(e) => {
                if let ToolError::InvalidArguments(details) = &e {
                    tracing::warn!(
                        tool = %request.tool_name,
                        id = %request.id,
                        ?details,
                        "Tool arguments failed validation"
                    );
                } else {
                    tracing::warn!(
                        tool = %request.tool_name,
                        id = %request.id,
                        duration_ms = %start.elapsed().as_millis(),
                        error = %e,
                        "Tool failed"
                    );
                }
                ToolResult::failure(&request.id, e.to_string())
            }
        }
    }

    async fn try_execute(&self, request: &ToolCallRequest) -> Result<Value, ToolError> {
        let entry = self
            .registry
            .resolve(&request.tool_name)
            .map_err(|_| ToolError::UnknownTool(request.tool_name.clone()))?;
        entry
            .validate(&request.arguments)
            .map_err(ToolError::InvalidArguments)?;

        let tool = Arc::clone(entry.tool());
        let ctx = self.ctx.clone();
        let input = request.arguments.clone();

        // Run on its own task so a panicking tool can't take the turn down
        let mut task = AbortOnDrop(tokio::spawn(async move { tool.run(input, &ctx).await }));

        match tokio::time::timeout(self.budget, &mut task.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ToolError::Crashed(join_error.to_string())),
            Err(_) => Err(ToolError::Timeout(self.budget)),
        }
    }
}

/// Owns a spawned tool task and aborts it when dropped, so a caller that gives
/// up on the call (turn timeout, cancelled request) never leaves it running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, EchoTool, FailingTool, PanickingTool, SlowTool};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn executor(budget: Duration) -> ToolExecutor {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();
        registry.register(Arc::new(PanickingTool)).unwrap();
        ToolExecutor::new(Arc::new(registry), test_context().0, budget)
    }

    #[tokio::test]
    async fn test_success_carries_output() {
        let result = executor(Duration::from_secs(5))
            .execute(&ToolCallRequest::new("c1", "echo", json!({"value": "hi"})))
            .await;
        assert_eq!(result.tool_call_id, "c1");
        assert_eq!(result.output, Some(json!({"echo": "hi"})));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let result = executor(Duration::from_secs(5))
            .execute(&ToolCallRequest::new("c1", "echo", json!({"value": 7})))
            .await;
        assert_eq!(result.error.as_deref(), Some("invalid arguments"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_synthesized() {
        let result = executor(Duration::from_secs(5))
            .execute(&ToolCallRequest::new("c1", "teleport", json!({})))
            .await;
        assert_eq!(result.error.as_deref(), Some("unknown tool: teleport"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_error() {
        let result = executor(Duration::from_secs(5))
            .execute(&ToolCallRequest::new("c1", "explode", json!({})))
            .await;
        assert!(result.error.unwrap().contains("generation failed"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_timeout_becomes_error() {
        let start = Instant::now();
        let result = executor(Duration::from_millis(50))
            .execute(&ToolCallRequest::new("c1", "slow", json!({"millis": 10_000})))
            .await;
        assert!(result.error.unwrap().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    /// Records whether its run got past the sleep
    struct FinishFlagTool(Arc<AtomicBool>);

    #[async_trait]
    impl Tool for FinishFlagTool {
        fn name(&self) -> &'static str {
            "finish_flag"
        }

        fn description(&self) -> String {
            "Sleeps, then raises a flag".to_string()
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn run(&self, _input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.store(true, Ordering::SeqCst);
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn test_dropped_call_aborts_the_tool_task() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut registry = ToolRegistry::default();
        registry
            .register(Arc::new(FinishFlagTool(finished.clone())))
            .unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), test_context().0, Duration::from_secs(5));

        // The caller gives up well inside the executor's own budget
        let request = ToolCallRequest::new("c1", "finish_flag", json!({}));
        let outcome = tokio::time::timeout(Duration::from_millis(20), executor.execute(&request)).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let result = executor(Duration::from_secs(5))
            .execute(&ToolCallRequest::new("c1", "panic", json!({})))
            .await;
        assert!(result.error.unwrap().contains("crashed"));
    }
}
