//! Memory tier types for Agentry sessions.
//!
//! A session carries three memory tiers: the append-only blackboard, a
//! single mutable scratchpad buffer, and durable named attributes saved
//! from tool results. `SessionMemory` is pure data -- the operations that
//! enforce the tier invariants live in `agentry-core`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a blackboard entry.
///
/// Categories drive loop-guard duplication checks and context-window
/// construction, so they are part of the wire format (snake_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlackboardCategory {
    Observation,
    Insight,
    Plan,
    Decision,
    Error,
    Artifact,
    Question,
    UserInterjection,
}

impl BlackboardCategory {
    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlackboardCategory::Observation => "observation",
            BlackboardCategory::Insight => "insight",
            BlackboardCategory::Plan => "plan",
            BlackboardCategory::Decision => "decision",
            BlackboardCategory::Error => "error",
            BlackboardCategory::Artifact => "artifact",
            BlackboardCategory::Question => "question",
            BlackboardCategory::UserInterjection => "user_interjection",
        }
    }
}

/// One immutable entry on the session blackboard.
///
/// Entries are append-only and ordered by creation. `auto` marks entries
/// synthesized by the loop guard rather than authored by the model, so
/// downstream consumers can filter them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardEntry {
    pub category: BlackboardCategory,
    pub content: String,
    /// Optional structured payload attached by the model or the loop guard.
    pub data: Option<Value>,
    /// Iteration the entry was produced in.
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
    /// Tool names associated with this entry, if any.
    pub tools: Vec<String>,
    /// True for loop-guard synthesized entries.
    pub auto: bool,
}

impl BlackboardEntry {
    /// Create a model-authored entry at the given iteration.
    pub fn new(category: BlackboardCategory, content: impl Into<String>, iteration: u32) -> Self {
        Self {
            category,
            content: content.into(),
            data: None,
            iteration,
            created_at: Utc::now(),
            tools: Vec::new(),
            auto: false,
        }
    }
}

/// A durable key-value result saved from a tool call.
///
/// Names are unique per session; writing an existing name overwrites it
/// (last writer wins, no versioning). Attributes are never deleted during
/// a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedAttribute {
    pub name: String,
    /// The tool whose result produced this attribute.
    pub tool: String,
    pub value: Value,
    /// Serialized size of `value` in bytes.
    pub size: usize,
    /// Iteration the attribute was created (or last overwritten) in.
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
}

/// The three memory tiers of one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMemory {
    /// Append-only categorized log of agent reasoning and progress.
    pub blackboard: Vec<BlackboardEntry>,
    /// Single mutable working buffer, fully replaced on each write.
    pub scratchpad: String,
    /// Named attributes, unique by name.
    pub attributes: Vec<NamedAttribute>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serde_uses_snake_case() {
        let json = serde_json::to_string(&BlackboardCategory::UserInterjection).unwrap();
        assert_eq!(json, "\"user_interjection\"");
        let parsed: BlackboardCategory = serde_json::from_str("\"insight\"").unwrap();
        assert_eq!(parsed, BlackboardCategory::Insight);
    }

    #[test]
    fn category_as_str_matches_serde() {
        for cat in [
            BlackboardCategory::Observation,
            BlackboardCategory::Insight,
            BlackboardCategory::Plan,
            BlackboardCategory::Decision,
            BlackboardCategory::Error,
            BlackboardCategory::Artifact,
            BlackboardCategory::Question,
            BlackboardCategory::UserInterjection,
        ] {
            let json = serde_json::to_string(&cat).unwrap();
            assert_eq!(json, format!("\"{}\"", cat.as_str()));
        }
    }

    #[test]
    fn new_entry_is_model_authored() {
        let entry = BlackboardEntry::new(BlackboardCategory::Plan, "outline the report", 3);
        assert!(!entry.auto);
        assert_eq!(entry.iteration, 3);
        assert!(entry.data.is_none());
        assert!(entry.tools.is_empty());
    }

    #[test]
    fn session_memory_default_is_empty() {
        let memory = SessionMemory::default();
        assert!(memory.blackboard.is_empty());
        assert!(memory.scratchpad.is_empty());
        assert!(memory.attributes.is_empty());
    }
}
