//! Active-session registry.
//!
//! At most one engine run may own a session at a time. The registry
//! hands out a drop guard per session id; a second acquire while the
//! first guard lives fails with `SessionBusy`. Shared via `Arc` so
//! engines, coordinators, and embedding callers see one registry.

use std::sync::Arc;

use agentry_types::error::EngineError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

/// Tracks which sessions currently have a running engine loop.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    inner: Arc<DashMap<Uuid, ()>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a session for exclusive execution.
    pub fn acquire(&self, id: Uuid) -> Result<ActiveGuard, EngineError> {
        match self.inner.entry(id) {
            Entry::Occupied(_) => Err(EngineError::SessionBusy(id)),
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(ActiveGuard {
                    id,
                    registry: Arc::clone(&self.inner),
                })
            }
        }
    }

    pub fn is_active(&self, id: &Uuid) -> bool {
        self.inner.contains_key(id)
    }
}

/// Releases the session claim on drop.
#[derive(Debug)]
pub struct ActiveGuard {
    id: Uuid,
    registry: Arc<DashMap<Uuid, ()>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy() {
        let registry = ActiveSessions::new();
        let id = Uuid::now_v7();

        let guard = registry.acquire(id).unwrap();
        assert!(registry.is_active(&id));
        assert!(matches!(
            registry.acquire(id),
            Err(EngineError::SessionBusy(busy)) if busy == id
        ));
        drop(guard);
    }

    #[test]
    fn drop_releases_claim() {
        let registry = ActiveSessions::new();
        let id = Uuid::now_v7();

        drop(registry.acquire(id).unwrap());
        assert!(!registry.is_active(&id));
        assert!(registry.acquire(id).is_ok());
    }

    #[test]
    fn distinct_sessions_run_concurrently() {
        let registry = ActiveSessions::new();
        let _a = registry.acquire(Uuid::now_v7()).unwrap();
        let _b = registry.acquire(Uuid::now_v7()).unwrap();
    }
}
