//! Language-model client port.
//!
//! The engine treats the LLM call as an external collaborator: it hands
//! over an `LlmRequest` and receives raw response text, which the session
//! engine parses into an `AgentResponse` (see `session::response`).
//! Transport, authentication, and retry policy all live behind this trait
//! in the embedding application.

use agentry_types::error::LlmError;
use agentry_types::llm::LlmRequest;

/// Trait for issuing one language-model call.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition). The engine
/// wraps each call in its own timeout; implementations should not retry --
/// retry policy, if any, belongs to the embedding caller.
pub trait LlmClient: Send + Sync {
    /// Issue one completion call and return the raw response text.
    fn complete(
        &self,
        request: &LlmRequest,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}
