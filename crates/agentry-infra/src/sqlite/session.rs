//! SQLite session store.
//!
//! Implements `SessionStore` from `agentry-core` using sqlx with split
//! read/write pools. Each session is persisted as one JSON document;
//! the status column is denormalized for filtering.

use agentry_core::storage::SessionStore;
use agentry_types::error::RepositoryError;
use agentry_types::session::{Session, SessionStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Ids of sessions in the given status, newest first.
    pub async fn list_ids_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let status_text = status_str(status);
        let rows = sqlx::query(
            "SELECT id FROM sessions WHERE status = ? ORDER BY updated_at DESC",
        )
        .bind(status_text)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row
                .try_get("id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))?;
            ids.push(id);
        }
        Ok(ids)
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Running => "running",
        SessionStatus::NeedsAssistance => "needs_assistance",
        SessionStatus::Completed => "completed",
        SessionStatus::Error => "error",
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl SessionStore for SqliteSessionStore {
    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let data = serde_json::to_string(session)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize session: {e}")))?;

        sqlx::query(
            r#"INSERT INTO sessions (id, status, data, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   status = excluded.status,
                   data = excluded.data,
                   updated_at = excluded.updated_at"#,
        )
        .bind(session.id.to_string())
        .bind(status_str(session.status))
        .bind(&data)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT data FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let data: String = row
                    .try_get("data")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let session: Session = serde_json::from_str(&data)
                    .map_err(|e| RepositoryError::Query(format!("invalid session JSON: {e}")))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }
}
