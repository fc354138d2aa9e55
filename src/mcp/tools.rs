//! Tool table and dispatcher for MCP tool calls.
//!
//! Every call walks `Received -> Validated -> Executing -> Succeeded | Failed`.
//! Whatever happens inside a handler, [`ToolDispatcher::dispatch`] returns a
//! [`ToolCallResult`] with text.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::mcp::error::ToolError;
use crate::mcp::schema::ValidatedArgs;
use crate::models::{ResultKind, ToolCallRequest, ToolCallResult, ToolDefinition};
use crate::services::ServiceContext;

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with already validated arguments
    async fn execute(&self, args: ValidatedArgs, ctx: &ServiceContext) -> Result<String, ToolError>;
}

/// A registered tool: its definition plus the handler that serves it
#[derive(Clone)]
pub struct Tool {
    pub definition: Arc<ToolDefinition>,
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition: Arc::new(definition),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.definition.name)
            .field("description", &self.definition.description)
            .finish()
    }
}

/// Errors while building the tool table
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

/// Where a call is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Received,
    Validated,
    Executing,
    Succeeded,
    Failed,
}

/// Running totals over all dispatched calls
#[derive(Debug, Default)]
pub struct DispatchStats {
    calls: AtomicU64,
    validation_errors: AtomicU64,
    upstream_errors: AtomicU64,
    internal_errors: AtomicU64,
    total_micros: AtomicU64,
}

impl DispatchStats {
    fn record(&self, kind: ResultKind, elapsed: Duration) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        let counter = match kind {
            ResultKind::Success => return,
            ResultKind::ValidationError => &self.validation_errors,
            ResultKind::UpstreamError => &self.upstream_errors,
            ResultKind::InternalError => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let calls = self.calls.load(Ordering::Relaxed);
        let validation_errors = self.validation_errors.load(Ordering::Relaxed);
        let upstream_errors = self.upstream_errors.load(Ordering::Relaxed);
        let internal_errors = self.internal_errors.load(Ordering::Relaxed);
        let total_micros = self.total_micros.load(Ordering::Relaxed);
        let errors = validation_errors + upstream_errors + internal_errors;

        StatsSnapshot {
            calls,
            errors,
            validation_errors,
            upstream_errors,
            internal_errors,
            error_rate: if calls == 0 {
                0.0
            } else {
                errors as f64 / calls as f64
            },
            average_latency_ms: if calls == 0 {
                0.0
            } else {
                total_micros as f64 / calls as f64 / 1000.0
            },
        }
    }
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub calls: u64,
    pub errors: u64,
    pub validation_errors: u64,
    pub upstream_errors: u64,
    pub internal_errors: u64,
    pub error_rate: f64,
    pub average_latency_ms: f64,
}

/// Name -> tool lookup table plus the call state machine
#[derive(Debug)]
pub struct ToolDispatcher {
    tools: HashMap<String, Tool>,
    context: ServiceContext,
    stats: DispatchStats,
}

impl ToolDispatcher {
    pub fn new(context: ServiceContext) -> Self {
        Self {
            tools: HashMap::new(),
            context,
            stats: DispatchStats::default(),
        }
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, tool: Tool) -> Result<(), DispatcherError> {
        if self.tools.contains_key(tool.name()) {
            return Err(DispatcherError::DuplicateTool(tool.name().to_string()));
        }
        tracing::debug!("Registered tool '{}'", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Registered tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<Arc<ToolDefinition>> {
        let mut defs: Vec<Arc<ToolDefinition>> = self
            .tools
            .values()
            .map(|t| Arc::clone(&t.definition))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// `list_tools` payload: `{name, description, inputSchema}` per tool, sorted by name
    pub fn list_tools(&self) -> Vec<Value> {
        self.definitions().iter().map(|d| d.to_json()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch a parsed request
    pub async fn handle_request(&self, request: ToolCallRequest) -> ToolCallResult {
        self.dispatch(&request.name, request.arguments).await
    }

    /// Run one tool call to completion. Never fails and never panics.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> ToolCallResult {
        let started = Instant::now();
        let result = self.run_call(name, arguments).await;
        let elapsed = started.elapsed();
        self.stats.record(result.kind, elapsed);

        tracing::info!(
            tool = name,
            kind = %result.kind,
            elapsed_ms = elapsed.as_millis() as u64,
            "Tool call finished"
        );
        result
    }

    async fn run_call(&self, name: &str, arguments: Value) -> ToolCallResult {
        trace_state(name, CallState::Received);

        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("Received call for unknown tool: {}", name);
            trace_state(name, CallState::Failed);
            return ToolCallResult::with_kind(
                ResultKind::ValidationError,
                format!("Unknown tool: {}", name),
            );
        };

        let args = match tool.definition.schema.validate(&arguments) {
            Ok(args) => args,
            Err(e) => {
                let text = format!("Invalid arguments for tool '{}': {}", name, e);
                tracing::warn!("{}", text);
                trace_state(name, CallState::Failed);
                return ToolCallResult::with_kind(ResultKind::ValidationError, text);
            }
        };
        trace_state(name, CallState::Validated);

        trace_state(name, CallState::Executing);
        let outcome = AssertUnwindSafe(tool.handler.execute(args, &self.context))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(text)) => ToolCallResult::success(text),
            Ok(Err(ToolError::Validation(e))) => {
                let text = format!("Invalid arguments for tool '{}': {}", name, e);
                tracing::warn!("{}", text);
                ToolCallResult::with_kind(ResultKind::ValidationError, text)
            }
            Ok(Err(e @ ToolError::Upstream { .. })) => {
                tracing::error!("Tool '{}' failed: {}", name, e);
                ToolCallResult::with_kind(ResultKind::UpstreamError, e.to_string())
            }
            Ok(Err(ToolError::Internal(detail))) => {
                tracing::error!("Unexpected error processing tool '{}': {}", name, detail);
                internal_error(name)
            }
            Err(panic) => {
                tracing::error!(
                    "Tool '{}' panicked: {}",
                    name,
                    panic_message(panic.as_ref())
                );
                internal_error(name)
            }
        };

        trace_state(
            name,
            if result.is_error() {
                CallState::Failed
            } else {
                CallState::Succeeded
            },
        );
        result
    }
}

fn trace_state(tool: &str, state: CallState) {
    tracing::debug!(tool, state = ?state, "Tool call state");
}

fn internal_error(name: &str) -> ToolCallResult {
    ToolCallResult::with_kind(
        ResultKind::InternalError,
        format!("An unexpected error occurred processing tool '{}'.", name),
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::schema::{FieldSpec, ToolSchema};
    use crate::services::ServiceRegistry;
    use serde_json::json;

    #[derive(Debug)]
    enum Behaviour {
        Echo,
        Upstream,
        Internal,
        Panic,
        RejectArgs,
    }

    #[derive(Debug)]
    struct TestHandler(Behaviour);

    #[async_trait::async_trait]
    impl ToolHandler for TestHandler {
        async fn execute(
            &self,
            args: ValidatedArgs,
            _ctx: &ServiceContext,
        ) -> Result<String, ToolError> {
            match self.0 {
                Behaviour::Echo => Ok(format!("echo: {}", args.str("message")?)),
                Behaviour::Upstream => Err(ToolError::upstream("Widget", "backend down")),
                Behaviour::Internal => Err(ToolError::Internal("secret detail".to_string())),
                Behaviour::Panic => panic!("handler exploded"),
                Behaviour::RejectArgs => Err(ToolError::Validation(
                    crate::mcp::schema::ValidationError::new("message", "not allowed"),
                )),
            }
        }
    }

    fn tool(name: &str, behaviour: Behaviour) -> Tool {
        let schema = ToolSchema::new().field(FieldSpec::string("message").required());
        Tool::new(
            ToolDefinition::new(name, format!("{} tool", name), schema),
            Arc::new(TestHandler(behaviour)),
        )
    }

    fn dispatcher() -> ToolDispatcher {
        let mut d = ToolDispatcher::new(ServiceContext::new(Arc::new(ServiceRegistry::new())));
        d.register(tool("echo", Behaviour::Echo)).unwrap();
        d.register(tool("upstream", Behaviour::Upstream)).unwrap();
        d.register(tool("internal", Behaviour::Internal)).unwrap();
        d.register(tool("panic", Behaviour::Panic)).unwrap();
        d.register(tool("reject", Behaviour::RejectArgs)).unwrap();
        d
    }

    #[tokio::test]
    async fn test_success() {
        let result = dispatcher().dispatch("echo", json!({"message": "hi"})).await;
        assert_eq!(result, ToolCallResult::success("echo: hi"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = dispatcher().dispatch("does_not_exist", json!({})).await;
        assert_eq!(result.kind, ResultKind::ValidationError);
        assert_eq!(result.text, "Unknown tool: does_not_exist");
    }

    #[tokio::test]
    async fn test_schema_failure_text() {
        let result = dispatcher().dispatch("echo", json!({})).await;
        assert_eq!(result.kind, ResultKind::ValidationError);
        assert_eq!(
            result.text,
            "Invalid arguments for tool 'echo': message: field required"
        );
    }

    #[tokio::test]
    async fn test_handler_validation_error() {
        let result = dispatcher().dispatch("reject", json!({"message": "x"})).await;
        assert_eq!(result.kind, ResultKind::ValidationError);
        assert_eq!(
            result.text,
            "Invalid arguments for tool 'reject': message: not allowed"
        );
    }

    #[tokio::test]
    async fn test_upstream_error() {
        let result = dispatcher().dispatch("upstream", json!({"message": "x"})).await;
        assert_eq!(result.kind, ResultKind::UpstreamError);
        assert_eq!(result.text, "Widget error: backend down");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let result = dispatcher().dispatch("internal", json!({"message": "x"})).await;
        assert_eq!(result.kind, ResultKind::InternalError);
        assert_eq!(
            result.text,
            "An unexpected error occurred processing tool 'internal'."
        );
        assert!(!result.text.contains("secret"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let result = dispatcher().dispatch("panic", json!({"message": "x"})).await;
        assert_eq!(result.kind, ResultKind::InternalError);
        assert_eq!(
            result.text,
            "An unexpected error occurred processing tool 'panic'."
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let mut d = dispatcher();
        let err = d.register(tool("echo", Behaviour::Echo)).unwrap_err();
        assert!(matches!(err, DispatcherError::DuplicateTool(name) if name == "echo"));
    }

    #[test]
    fn test_list_tools_sorted() {
        let names: Vec<String> = dispatcher()
            .list_tools()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["echo", "internal", "panic", "reject", "upstream"]);
    }

    #[tokio::test]
    async fn test_stats_track_kinds() {
        let d = dispatcher();
        d.dispatch("echo", json!({"message": "a"})).await;
        d.dispatch("upstream", json!({"message": "a"})).await;
        d.dispatch("nope", json!({})).await;

        let stats = d.stats();
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.upstream_errors, 1);
        assert_eq!(stats.validation_errors, 1);
        assert!((stats.error_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_handle_jsonrpc_request() {
        let request: ToolCallRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "echo",
            "params": {"message": "rpc"},
            "id": 1
        }))
        .unwrap();
        let result = dispatcher().handle_request(request).await;
        assert_eq!(result.text, "echo: rpc");
    }
}
