//! Tool call types for Agentry.
//!
//! `ToolCallRecord` is the durable record of one attempted invocation;
//! `ToolOutcome` is the normalized executor result; `MemoryCommand` is the
//! explicit message a local-handler tool returns to mutate session state
//! (instead of reaching into the session directly).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::memory::BlackboardCategory;
use crate::session::ExpectedInput;

/// Where a tool executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Dispatched over the network to a named remote operation.
    Remote,
    /// Executes inside the orchestrator's own environment.
    Local,
}

/// Static classification of one tool in the dispatcher's route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRoute {
    pub kind: ToolKind,
    /// True for tools that produce binary payloads (image/audio generation).
    /// Their results are summarized, not inlined, when folded back into
    /// model context.
    pub binary: bool,
}

impl ToolRoute {
    pub fn remote() -> Self {
        Self {
            kind: ToolKind::Remote,
            binary: false,
        }
    }

    pub fn local() -> Self {
        Self {
            kind: ToolKind::Local,
            binary: false,
        }
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }
}

/// Execution status of a tool call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Executing,
    Completed,
    Error,
}

/// Durable record of one attempted tool invocation.
///
/// Created when the engine parses a requested call; transitions to
/// `Completed` or `Error` when the dispatcher returns; never mutated
/// afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: Uuid,
    pub tool: String,
    /// Input parameters before reference resolution.
    pub params: Value,
    pub status: ToolCallStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub iteration: u32,
}

impl ToolCallRecord {
    /// Create a pending record for a parsed tool-call request.
    pub fn pending(tool: impl Into<String>, params: Value, iteration: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            tool: tool.into(),
            params,
            status: ToolCallStatus::Pending,
            result: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            iteration,
        }
    }

    /// Mark the record completed with a result payload.
    pub fn complete(&mut self, result: Value) {
        self.status = ToolCallStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    /// Mark the record failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ToolCallStatus::Error;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

/// Normalized result of one tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Session-state mutation requested by a local-handler tool.
///
/// Local tools return these alongside their outcome; the session engine
/// applies them under its exclusive ownership of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MemoryCommand {
    AppendBlackboard {
        category: BlackboardCategory,
        content: String,
        data: Option<Value>,
    },
    SetScratchpad {
        content: String,
    },
    CreateArtifact {
        kind: String,
        title: String,
        content: String,
        mime_type: Option<String>,
    },
    RequestAssistance {
        question: String,
        context: String,
        expected: ExpectedInput,
    },
}

/// Summary shape used when a binary tool result crosses back into text
/// context: `{ _binaryContent: true, mimeType, size, summary }`.
pub fn binary_summary(mime_type: &str, size: usize) -> Value {
    json!({
        "_binaryContent": true,
        "mimeType": mime_type,
        "size": size,
        "summary": format!("[Binary {} - {}KB]", mime_type, size / 1024),
    })
}
