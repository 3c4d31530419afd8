//! Session types for Agentry.
//!
//! A `Session` is one autonomous run: task text, status, iteration
//! counters, the three memory tiers, tool call records, artifacts,
//! conversation messages, and the optional pending assistance request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::memory::SessionMemory;
use crate::tool::ToolCallRecord;

/// Lifecycle status of a session.
///
/// `Completed` and `Error` are terminal. `NeedsAssistance` is a suspend
/// state that resumes to `Running` once an assistance response is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    NeedsAssistance,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message in the session conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A file uploaded as input to the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFile {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size: usize,
}

/// Kind of input expected from the user for an assistance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedInput {
    FreeText,
    File,
    MultipleChoice { options: Vec<String> },
}

/// The user's answer to an assistance request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistanceResponse {
    pub text: Option<String>,
    pub chosen_option: Option<String>,
    pub file_id: Option<Uuid>,
    pub responded_at: DateTime<Utc>,
}

impl AssistanceResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            chosen_option: None,
            file_id: None,
            responded_at: Utc::now(),
        }
    }

    /// Render the response as context text for the next iteration.
    pub fn render(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        if let Some(option) = &self.chosen_option {
            return format!("selected option: {option}");
        }
        if let Some(file_id) = &self.file_id {
            return format!("attached file: {file_id}");
        }
        String::new()
    }
}

/// A blocking request for human input.
///
/// Created when the model (or a local `request_assistance` tool) signals a
/// blocking need; consumed and cleared exactly once, on the iteration
/// following the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistanceRequest {
    pub question: String,
    pub context: String,
    pub expected: ExpectedInput,
    pub response: Option<AssistanceResponse>,
    pub created_at: DateTime<Utc>,
}

impl AssistanceRequest {
    pub fn new(
        question: impl Into<String>,
        context: impl Into<String>,
        expected: ExpectedInput,
    ) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            expected,
            response: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }
}

/// Final report persisted when a session completes.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FinalReport {
    pub summary: String,
    pub tools_used: Vec<String>,
    pub artifacts_created: Vec<String>,
    pub key_findings: Vec<String>,
}

/// One autonomous agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    /// The original task text, verbatim.
    pub task: String,
    /// Model identifier handed to the LLM client.
    pub model: String,
    /// Current iteration, 0-based. Never exceeds `max_iterations`.
    pub iteration: u32,
    pub max_iterations: u32,
    pub memory: SessionMemory,
    pub tool_calls: Vec<ToolCallRecord>,
    pub artifacts: Vec<Artifact>,
    pub messages: Vec<ConversationMessage>,
    pub input_files: Vec<InputFile>,
    pub assistance: Option<AssistanceRequest>,
    /// Present only in the terminal `Completed` state.
    pub final_report: Option<FinalReport>,
    /// Terminal error text, if the session failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new running session for a task.
    pub fn new(task: impl Into<String>, model: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        let task = task.into();
        Self {
            id: Uuid::now_v7(),
            status: SessionStatus::Running,
            messages: vec![ConversationMessage::user(task.clone())],
            task,
            model: model.into(),
            iteration: 0,
            max_iterations,
            memory: SessionMemory::default(),
            tool_calls: Vec::new(),
            artifacts: Vec::new(),
            input_files: Vec::new(),
            assistance: None,
            final_report: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up an artifact by identifier.
    pub fn artifact(&self, id: &Uuid) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| &a.id == id)
    }
}
