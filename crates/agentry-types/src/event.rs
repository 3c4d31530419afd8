//! Event types for the Agentry engine event bus.
//!
//! `EngineEvent` is the unified event type broadcast during a session run.
//! All variants are Clone + Send + Sync for use with tokio broadcast
//! channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionStatus;

/// Events emitted during session execution.
///
/// Used by the event bus to communicate iteration lifecycle, tool
/// dispatch, loop-guard, and child-session events to subscribers
/// (UI, logging, embedding callers).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A new iteration has started.
    IterationStarted { session_id: Uuid, iteration: u32 },

    /// The LLM call for an iteration has returned.
    LlmCallFinished {
        session_id: Uuid,
        iteration: u32,
        duration_ms: u64,
    },

    /// A tool call has been dispatched.
    ToolDispatched {
        session_id: Uuid,
        call_id: Uuid,
        tool: String,
        iteration: u32,
    },

    /// A tool call completed successfully.
    ToolCompleted {
        session_id: Uuid,
        call_id: Uuid,
        tool: String,
        duration_ms: u64,
    },

    /// A tool call failed; the iteration continues.
    ToolFailed {
        session_id: Uuid,
        call_id: Uuid,
        tool: String,
        error: String,
    },

    /// Requested tool calls beyond the per-iteration budget were dropped.
    ToolBudgetTruncated {
        session_id: Uuid,
        requested: usize,
        dispatched: usize,
    },

    /// A blackboard entry was appended.
    BlackboardAppended {
        session_id: Uuid,
        iteration: u32,
        /// True for loop-guard synthesized entries.
        auto: bool,
    },

    /// The loop guard detected repetition and queued a warning.
    LoopWarning {
        session_id: Uuid,
        category: String,
        occurrences: u32,
    },

    /// The session is suspended waiting for user input.
    AssistanceRequested { session_id: Uuid, question: String },

    /// The session reached a terminal or suspended state.
    SessionFinished {
        session_id: Uuid,
        status: SessionStatus,
        iterations: u32,
    },

    /// A child session has been spawned.
    ChildSpawned {
        parent_id: Uuid,
        child_id: Uuid,
        task: String,
        /// Index of this child among its siblings (0-based).
        index: usize,
        /// Total number of children in this batch.
        total: usize,
    },

    /// A child session finished (success or failure).
    ChildFinished {
        parent_id: Uuid,
        child_id: Uuid,
        index: usize,
        status: SessionStatus,
    },

    /// All children finished and their memory was merged into the parent.
    ChildrenMerged {
        parent_id: Uuid,
        merged: usize,
        failed: usize,
    },
}
