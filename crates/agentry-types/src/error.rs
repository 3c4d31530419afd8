use thiserror::Error;
use uuid::Uuid;

/// Errors from the language-model call boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("call timed out after {0}s")]
    Timeout(u64),
}

/// Errors from an individual tool execution.
///
/// Recorded on the owning `ToolCallRecord`; never aborts the iteration.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("tool call timed out after {0}s")]
    Timeout(u64),
}

/// Errors from repository operations (used by trait definitions in
/// agentry-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Engine-level failures.
///
/// None of these escape the loop boundary during a run; they are attached
/// to the session record so the embedding caller can render the exact
/// failure. Hitting the iteration cap is not an error at all: the engine
/// reports it as a run outcome and leaves the session resumable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("model response is not valid structured data")]
    Parse {
        /// The raw model output, preserved for diagnostics.
        raw: String,
    },

    #[error("session {0} is already running")]
    SessionBusy(Uuid),

    #[error("session has no pending assistance request")]
    NoPendingAssistance,

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "transport error: connection reset");
        assert_eq!(LlmError::Timeout(30).to_string(), "call timed out after 30s");
    }

    #[test]
    fn engine_error_from_llm() {
        let err: EngineError = LlmError::Transport("dns".to_string()).into();
        assert!(matches!(err, EngineError::Llm(_)));
    }

    #[test]
    fn parse_error_preserves_raw() {
        let err = EngineError::Parse {
            raw: "not json at all".to_string(),
        };
        if let EngineError::Parse { raw } = &err {
            assert_eq!(raw, "not json at all");
        }
        assert_eq!(err.to_string(), "model response is not valid structured data");
    }

    #[test]
    fn repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }
}
