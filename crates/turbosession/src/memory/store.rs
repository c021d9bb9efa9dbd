//! Identifier-to-record map with a two-phase sweep

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::Instant;

use super::MemorySession;

/// Container of live (and not-yet-reaped) memory sessions
///
/// The container lock only guards the map. Record locks are taken while holding it
/// (container first, record second) but never the other way round.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Arc<MemorySession>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, id: String, session: Arc<MemorySession>) {
        self.sessions.write().insert(id, session);
    }

    /// Look up a record, live or not
    pub fn get(&self, id: &str) -> Option<Arc<MemorySession>> {
        self.sessions.read().get(id).cloned()
    }

    pub(crate) fn remove(&self, id: &str) -> Option<Arc<MemorySession>> {
        self.sessions.write().remove(id)
    }

    /// Remove `id` only if it is still dead at `now`
    pub(crate) fn remove_if_expired(&self, id: &str, now: Instant) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(id) {
            Some(session) if session.is_expired_at(now) => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Number of records held, including dead ones awaiting the sweep
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Reap every record dead at the current instant; returns how many were removed
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let candidates = self.expired_candidates(now);
        if candidates.is_empty() {
            return 0;
        }
        self.remove_expired(&candidates, now)
    }

    /// Phase one: ids dead at `now`, collected under the read lock
    pub(crate) fn expired_candidates(&self, now: Instant) -> Vec<String> {
        self.sessions
            .read()
            .iter()
            .filter(|(_, session)| session.is_expired_at(now))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Phase two: re-check each candidate under the write lock before removing it
    pub(crate) fn remove_expired(&self, candidates: &[String], now: Instant) -> usize {
        let mut sessions = self.sessions.write();
        let mut removed = 0;
        for id in candidates {
            if sessions.get(id).is_some_and(|s| s.is_expired_at(now)) {
                sessions.remove(id);
                removed += 1;
            }
        }
        removed
    }
}
