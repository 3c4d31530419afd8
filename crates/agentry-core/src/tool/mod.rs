//! Tool execution ports and the dispatch pipeline.

pub mod dispatcher;

pub use dispatcher::{DispatchCall, DispatchResult, ToolDispatcher};

use agentry_types::error::ToolError;
use agentry_types::tool::{MemoryCommand, ToolOutcome};
use serde_json::Value;

/// Executes remote tools over the network (search, scraping, media
/// generation). Implementations live in the embedding application.
pub trait RemoteToolExecutor: Send + Sync {
    /// Execute one named remote operation with resolved parameters.
    fn execute(
        &self,
        tool: &str,
        params: &Value,
    ) -> impl std::future::Future<Output = Result<Value, ToolError>> + Send;
}

/// Result of a local tool: an outcome plus the session-state mutations
/// the tool requests. Local tools never touch the session directly; the
/// engine applies the commands under its exclusive ownership.
#[derive(Debug)]
pub struct LocalToolResponse {
    pub outcome: ToolOutcome,
    pub commands: Vec<MemoryCommand>,
}

impl LocalToolResponse {
    /// An outcome with no state mutations.
    pub fn plain(outcome: ToolOutcome) -> Self {
        Self {
            outcome,
            commands: Vec::new(),
        }
    }
}

/// Handles tools that execute inside the orchestrator's own environment
/// (memory writes, artifact creation, assistance requests).
pub trait LocalToolHandler: Send + Sync {
    fn handle(
        &self,
        tool: &str,
        params: &Value,
    ) -> impl std::future::Future<Output = Result<LocalToolResponse, ToolError>> + Send;
}
