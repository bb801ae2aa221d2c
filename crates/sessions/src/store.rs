//! In-memory session registry.
//!
//! Each session owns one messaging connection plus the progress of the
//! current (or last) dispatch.  All mutation goes through [`SessionStore`]
//! so every read-modify-write happens under the map's write lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hm_connector::MessagingConnection;
use hm_domain::error::{Error, Result};
use hm_domain::trace::TraceEvent;
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single session tracked by the gateway.
pub struct SessionEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub connection: Arc<dyn MessagingConnection>,
    /// `true` from the moment a dispatch is accepted until its connection
    /// has been logged out and disconnected.
    pub processing: bool,
    pub success: Vec<String>,
    pub failures: Vec<String>,
}

impl SessionEntry {
    fn new(id: Uuid, connection: Arc<dyn MessagingConnection>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            connection,
            processing: false,
            success: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Append a dispatch outcome line to the matching log.
    pub fn record(&mut self, sent: bool, line: String) {
        if sent {
            self.success.push(line);
        } else {
            self.failures.push(line);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            processing: self.processing,
            success: self.success.clone(),
            failures: self.failures.clone(),
        }
    }
}

impl fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEntry")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("processing", &self.processing)
            .field("success", &self.success.len())
            .field("failures", &self.failures.len())
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of a session's dispatch progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub processing: bool,
    pub success: Vec<String>,
    pub failures: Vec<String>,
}

/// Listing row for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub processing: bool,
}

/// Parse a caller-supplied session identifier.  Anything that is not a
/// UUID cannot name a session, so it maps to `SessionNotFound`.
pub fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::SessionNotFound(raw.to_owned()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under a fresh identifier.
    pub fn create(&self, connection: Arc<dyn MessagingConnection>) -> Uuid {
        let mut sessions = self.sessions.write();
        let mut id = Uuid::new_v4();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4();
        }
        sessions.insert(id, SessionEntry::new(id, connection));
        drop(sessions);

        TraceEvent::SessionCreated {
            session_id: id.to_string(),
        }
        .emit();
        id
    }

    pub fn get(&self, id: &Uuid) -> Result<SessionSnapshot> {
        self.sessions
            .read()
            .get(id)
            .map(SessionEntry::snapshot)
            .ok_or_else(|| not_found(id))
    }

    /// The connection owned by a session.
    pub fn connection(&self, id: &Uuid) -> Result<Arc<dyn MessagingConnection>> {
        self.sessions
            .read()
            .get(id)
            .map(|s| s.connection.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Apply `f` to a session while holding the write lock.
    pub fn update<F, R>(&self, id: &Uuid, f: F) -> Result<R>
    where
        F: FnOnce(&mut SessionEntry) -> R,
    {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(id) {
            Some(entry) => Ok(f(entry)),
            None => Err(not_found(id)),
        }
    }

    /// Mark a session as processing and clear its logs.
    ///
    /// Fails with `DispatchInProgress` if a dispatch already owns the
    /// session.  The test and the set happen under one write lock.
    pub fn begin_dispatch(&self, id: &Uuid) -> Result<Arc<dyn MessagingConnection>> {
        self.update(id, |entry| {
            if entry.processing {
                return Err(Error::DispatchInProgress(id.to_string()));
            }
            entry.processing = true;
            entry.success.clear();
            entry.failures.clear();
            Ok(entry.connection.clone())
        })?
    }

    /// Remove a session.  Idempotent: removing an unknown id returns `None`.
    pub fn remove(&self, id: &Uuid) -> Option<SessionEntry> {
        let removed = self.sessions.write().remove(id);
        if let Some(ref entry) = removed {
            TraceEvent::SessionRemoved {
                session_id: id.to_string(),
                was_processing: entry.processing,
            }
            .emit();
        }
        removed
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> = self
            .sessions
            .read()
            .values()
            .map(|s| SessionSummary {
                id: s.id,
                created_at: s.created_at,
                processing: s.processing,
            })
            .collect();
        out.sort_by_key(|s| s.created_at);
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

fn not_found(id: &Uuid) -> Error {
    Error::SessionNotFound(id.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use hm_connector::LoopbackConnection;

    fn store_with_session() -> (SessionStore, Uuid) {
        let store = SessionStore::new();
        let id = store.create(Arc::new(LoopbackConnection::new()));
        (store, id)
    }

    #[test]
    fn new_session_is_idle_with_empty_logs() {
        let (store, id) = store_with_session();
        let snap = store.get(&id).unwrap();
        assert!(!snap.processing);
        assert!(snap.success.is_empty());
        assert!(snap.failures.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(&id), Err(Error::SessionNotFound(_))));
        assert!(matches!(
            store.update(&id, |_| ()),
            Err(Error::SessionNotFound(_))
        ));
        assert!(store.connection(&id).is_err());
    }

    #[test]
    fn update_records_outcomes() {
        let (store, id) = store_with_session();
        store
            .update(&id, |s| {
                s.record(true, "Message sent to a".into());
                s.record(false, "Could not send message to b: boom".into());
            })
            .unwrap();
        let snap = store.get(&id).unwrap();
        assert_eq!(snap.success, vec!["Message sent to a"]);
        assert_eq!(snap.failures, vec!["Could not send message to b: boom"]);
    }

    #[test]
    fn begin_dispatch_rejects_second_caller_and_resets_logs() {
        let (store, id) = store_with_session();
        store
            .update(&id, |s| s.record(true, "old".into()))
            .unwrap();

        store.begin_dispatch(&id).unwrap();
        let snap = store.get(&id).unwrap();
        assert!(snap.processing);
        assert!(snap.success.is_empty());

        assert!(matches!(
            store.begin_dispatch(&id),
            Err(Error::DispatchInProgress(_))
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let (store, id) = store_with_session();
        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
        assert!(store.get(&id).is_err());
    }

    #[test]
    fn malformed_id_maps_to_not_found() {
        assert!(matches!(
            parse_session_id("not-a-uuid"),
            Err(Error::SessionNotFound(_))
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_session_id(&format!(" {id} ")).unwrap(), id);
    }

    #[test]
    fn list_is_ordered_by_creation() {
        let store = SessionStore::new();
        let a = store.create(Arc::new(LoopbackConnection::new()));
        let b = store.create(Arc::new(LoopbackConnection::new()));
        let ids: Vec<Uuid> = store.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }
}
