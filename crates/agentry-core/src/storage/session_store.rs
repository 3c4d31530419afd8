//! Session store trait.
//!
//! Defines the key-value persistence interface the engine calls after
//! every mutating step. No transaction semantics are required.
//! Implementations live in agentry-infra.

use agentry_types::error::RepositoryError;
use agentry_types::session::Session;
use uuid::Uuid;

/// Trait for session persistence.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in agentry-infra (in-memory and SQLite).
pub trait SessionStore: Send + Sync {
    /// Persist the session, overwriting any previous version (upsert).
    fn save(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a session by id. Returns None if it does not exist.
    fn load(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;
}
