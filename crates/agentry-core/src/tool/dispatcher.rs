//! Tool dispatch: routing and concurrent execution.
//!
//! The dispatcher receives the iteration's calls with their parameters
//! already resolved and already truncated to the per-iteration budget
//! (the engine enforces `call_budget()` before building calls), routes
//! each to the remote executor or the local handler, and normalizes
//! every result into a `DispatchResult`. Remote calls run concurrently;
//! local calls run serialized in request order because they return
//! session-state commands whose order matters. Individual failures
//! never abort the batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentry_types::error::ToolError;
use agentry_types::tool::{MemoryCommand, ToolOutcome, ToolRoute, binary_summary};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::debug;

use super::{LocalToolHandler, LocalToolResponse, RemoteToolExecutor};

/// Default per-iteration tool call budget.
pub const DEFAULT_CALL_BUDGET: usize = 5;

/// Default per-call execution timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// One call to dispatch, parameters already reference-resolved.
#[derive(Debug, Clone)]
pub struct DispatchCall {
    pub tool: String,
    pub params: Value,
    pub save_as: Option<String>,
}

/// Normalized result of one dispatched call.
#[derive(Debug)]
pub struct DispatchResult {
    pub tool: String,
    pub save_as: Option<String>,
    pub outcome: ToolOutcome,
    /// The value to fold into model context. For binary tools this is the
    /// summary shape, never the raw payload; the full result stays on the
    /// tool call record.
    pub context_value: Option<Value>,
    /// Session-state commands returned by a local tool.
    pub commands: Vec<MemoryCommand>,
}

/// Routes and executes one iteration's tool calls.
#[derive(Debug)]
pub struct ToolDispatcher<R, L> {
    routes: HashMap<String, ToolRoute>,
    remote: Arc<R>,
    local: Arc<L>,
    call_budget: usize,
    tool_timeout: Duration,
}

impl<R: RemoteToolExecutor, L: LocalToolHandler> ToolDispatcher<R, L> {
    pub fn new(remote: Arc<R>, local: Arc<L>) -> Self {
        Self {
            routes: HashMap::new(),
            remote,
            local,
            call_budget: DEFAULT_CALL_BUDGET,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Register a tool in the route table.
    pub fn route(mut self, name: impl Into<String>, route: ToolRoute) -> Self {
        self.routes.insert(name.into(), route);
        self
    }

    pub fn with_call_budget(mut self, budget: usize) -> Self {
        self.call_budget = budget;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn call_budget(&self) -> usize {
        self.call_budget
    }

    /// Look up a tool's route. Unknown tools have no route and fail at
    /// dispatch time.
    pub fn route_of(&self, tool: &str) -> Option<ToolRoute> {
        self.routes.get(tool).copied()
    }

    /// Execute one iteration's calls: route, run, normalize. Results
    /// come back one per call, in request order.
    pub async fn dispatch(&self, calls: Vec<DispatchCall>) -> Vec<DispatchResult> {
        // Partition by route, remembering original positions so results
        // come back in request order.
        let mut remote_calls: Vec<(usize, DispatchCall)> = Vec::new();
        let mut local_calls: Vec<(usize, DispatchCall)> = Vec::new();
        let mut slots: Vec<Option<DispatchResult>> = Vec::new();

        for (index, call) in calls.into_iter().enumerate() {
            slots.push(None);
            match self.routes.get(&call.tool) {
                Some(route) if route.kind == agentry_types::tool::ToolKind::Remote => {
                    remote_calls.push((index, call));
                }
                Some(_) => local_calls.push((index, call)),
                None => {
                    let error = ToolError::UnknownTool(call.tool.clone());
                    slots[index] = Some(DispatchResult {
                        tool: call.tool,
                        save_as: call.save_as,
                        outcome: ToolOutcome::err(error.to_string()),
                        context_value: None,
                        commands: Vec::new(),
                    });
                }
            }
        }

        // Remote calls run concurrently.
        let remote_futures = remote_calls.into_iter().map(|(index, call)| async move {
            let result = self.execute_remote(&call).await;
            (index, result)
        });
        for (index, result) in join_all(remote_futures).await {
            slots[index] = Some(result);
        }

        // Local calls run serialized, preserving request order.
        for (index, call) in local_calls {
            slots[index] = Some(self.execute_local(&call).await);
        }

        slots.into_iter().flatten().collect()
    }

    async fn execute_remote(&self, call: &DispatchCall) -> DispatchResult {
        debug!(tool = %call.tool, "dispatching remote tool");
        let executed = tokio::time::timeout(
            self.tool_timeout,
            self.remote.execute(&call.tool, &call.params),
        )
        .await;

        let outcome = match executed {
            Ok(Ok(value)) => ToolOutcome::ok(value),
            Ok(Err(error)) => ToolOutcome::err(error.to_string()),
            Err(_) => {
                ToolOutcome::err(ToolError::Timeout(self.tool_timeout.as_secs()).to_string())
            }
        };

        let binary = self
            .routes
            .get(&call.tool)
            .map(|r| r.binary)
            .unwrap_or(false);
        let context_value = outcome.result.as_ref().map(|result| {
            if binary {
                fold_binary(result)
            } else {
                result.clone()
            }
        });

        DispatchResult {
            tool: call.tool.clone(),
            save_as: call.save_as.clone(),
            outcome,
            context_value,
            commands: Vec::new(),
        }
    }

    async fn execute_local(&self, call: &DispatchCall) -> DispatchResult {
        debug!(tool = %call.tool, "dispatching local tool");
        let executed = tokio::time::timeout(
            self.tool_timeout,
            self.local.handle(&call.tool, &call.params),
        )
        .await;

        let (outcome, commands) = match executed {
            Ok(Ok(LocalToolResponse { outcome, commands })) => (outcome, commands),
            Ok(Err(error)) => (ToolOutcome::err(error.to_string()), Vec::new()),
            Err(_) => (
                ToolOutcome::err(ToolError::Timeout(self.tool_timeout.as_secs()).to_string()),
                Vec::new(),
            ),
        };

        let context_value = outcome.result.clone();
        DispatchResult {
            tool: call.tool.clone(),
            save_as: call.save_as.clone(),
            outcome,
            context_value,
            commands,
        }
    }
}

/// Fold a binary tool result into its context-facing summary. The mime
/// type and payload size are read from the result when present.
fn fold_binary(result: &Value) -> Value {
    let mime_type = result
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream");
    let size = result
        .get("data")
        .and_then(Value::as_str)
        .map(str::len)
        .or_else(|| result.get("size").and_then(Value::as_u64).map(|s| s as usize))
        .unwrap_or_else(|| result.to_string().len());
    binary_summary(mime_type, size)
}
