//! Artifact types for Agentry sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deliverable produced by the agent (document, code, data).
///
/// Artifacts are referenceable by identifier through the reference
/// resolver (`{{ artifact.<id> }}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    /// Free-form kind tag, e.g. "document", "code", "data".
    pub kind: String,
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    /// Content size in bytes.
    pub size: usize,
    /// Iteration the artifact was created in.
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Create an artifact, deriving `size` from the content.
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        iteration: u32,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::now_v7(),
            kind: kind.into(),
            title: title.into(),
            size: content.len(),
            content,
            description: None,
            mime_type: None,
            iteration,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_size_from_content() {
        let artifact = Artifact::new("document", "Report", "hello world", 2);
        assert_eq!(artifact.size, 11);
        assert_eq!(artifact.iteration, 2);
        assert!(artifact.mime_type.is_none());
    }

    #[test]
    fn artifact_serde_roundtrip() {
        let artifact = Artifact::new("code", "script.py", "print('hi')", 0);
        let json = serde_json::to_string(&artifact).unwrap();
        let parsed: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, artifact.id);
        assert_eq!(parsed.content, "print('hi')");
    }
}
