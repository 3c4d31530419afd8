//! In-memory session store.
//!
//! Backed by a `DashMap` keyed by session id. Suited to tests and
//! embedded callers that do not need durability; the SQLite store in
//! `crate::sqlite` is the durable counterpart.

use std::sync::Arc;

use agentry_core::storage::SessionStore;
use agentry_types::error::RepositoryError;
use agentry_types::session::Session;
use dashmap::DashMap;
use uuid::Uuid;

/// `SessionStore` over a shared concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }
}
