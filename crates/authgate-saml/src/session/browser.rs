//! Server-side browser sessions.
//!
//! The browser is correlated to its session by an opaque cookie holding a
//! session UUID; the session itself holds the whole [`IdentityRecord`]
//! as-is for the duration of the authenticated browser session. This is
//! the `Authenticated` state of the protocol state machine: a caller with
//! a live session here is authenticated, everyone else is not.
//!
//! Sessions carry the same lifetime as the session cookie: once the
//! cookie's `Max-Age` has passed the server-side entry is dead weight,
//! so lookups evict it lazily and the periodic sweep reclaims the rest.

use super::cookies::SESSION_COOKIE_MAX_AGE;
use super::types::{Clock, IdentityRecord, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SessionEntry {
    record: IdentityRecord,
    created_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// In-memory browser session store.
pub struct BrowserSessions {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for BrowserSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(
            Duration::seconds(SESSION_COOKIE_MAX_AGE),
            Arc::new(SystemClock),
        )
    }

    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Bind a freshly asserted identity to a new session.
    pub async fn create(&self, record: IdentityRecord) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            SessionEntry {
                record,
                created_at: self.clock.now(),
            },
        );
        id
    }

    /// Look up the identity bound to a session, evicting it if its
    /// lifetime has passed.
    pub async fn get(&self, id: Uuid) -> Option<IdentityRecord> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        match sessions.get(&id) {
            Some(entry) if entry.is_expired(now, self.ttl) => {
                sessions.remove(&id);
                None
            }
            Some(entry) => Some(entry.record.clone()),
            None => None,
        }
    }

    /// Remove a session; returns the identity it held, if any.
    pub async fn remove(&self, id: Uuid) -> Option<IdentityRecord> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id).map(|entry| entry.record)
    }

    /// Remove every session carrying the given protocol session index.
    ///
    /// IdP-initiated logout correlates via `sessionIndex`, never via the
    /// subject key: the IdP has no browser session context of ours.
    /// Returns the evicted identities so callers can clear the identity
    /// cache as well.
    pub async fn remove_by_session_index(&self, session_index: &str) -> Vec<IdentityRecord> {
        let mut sessions = self.sessions.write().await;
        let ids: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| entry.record.session_index.as_deref() == Some(session_index))
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| sessions.remove(&id).map(|entry| entry.record))
            .collect()
    }

    /// Drop every session past its lifetime. Returns the number evicted.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now, self.ttl));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
