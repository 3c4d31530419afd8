//! Structured LLM request and response types.
//!
//! The engine never speaks to a model directly; it hands an `LlmRequest`
//! to an `LlmClient` implementation and parses the returned text into an
//! `AgentResponse`. The response types derive `JsonSchema` so embedders
//! can pass the expected shape to their model as a structured-output
//! schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::BlackboardCategory;
use crate::session::{ExpectedInput, FinalReport};

/// Request handed to the LLM client: assembled context plus the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    /// System/context text assembled by the engine for this iteration.
    pub context: String,
    /// The task text, verbatim.
    pub task: String,
}

/// Status field of a structured model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
    NeedsAssistance,
    Error,
}

impl Default for ResponseStatus {
    fn default() -> Self {
        ResponseStatus::InProgress
    }
}

/// One requested tool call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolRequest {
    pub tool: String,
    /// Parameters, possibly containing `{{ ... }}` reference tokens.
    #[serde(default)]
    #[schemars(with = "Value")]
    pub params: Value,
    /// When set, the tool result is saved as a named attribute.
    #[serde(default)]
    pub save_as: Option<String>,
}

/// A blackboard entry proposed by the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProposedEntry {
    pub category: BlackboardCategory,
    pub content: String,
    #[serde(default)]
    #[schemars(with = "Option<Value>")]
    pub data: Option<Value>,
}

/// An artifact proposed by the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProposedArtifact {
    pub kind: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// An assistance request raised directly by the model response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssistanceSpec {
    pub question: String,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_expected")]
    pub expected: ExpectedInput,
}

fn default_expected() -> ExpectedInput {
    ExpectedInput::FreeText
}

/// The structured shape every model response must decode to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentResponse {
    pub reasoning: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolRequest>,
    #[serde(default)]
    pub blackboard_entry: Option<ProposedEntry>,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub message_to_user: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<ProposedArtifact>,
    /// Required when `status` is `completed`.
    #[serde(default)]
    pub final_report: Option<FinalReport>,
    /// Populated when `status` is `needs_assistance`.
    #[serde(default)]
    pub assistance: Option<AssistanceSpec>,
}
