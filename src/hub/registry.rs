use crate::hub::session::Session;
use crate::protocol::{ServerMessage, Snapshot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound queue of one connection. Unbounded: slow consumers are not throttled.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

struct SessionEntry {
    session: Session,
    outbox: Outbox,
}

/// Table of connected sessions, keyed by session id.
///
/// Reads are public so HTTP handlers can expose the roster; inserts, removals
/// and mutations are only reachable through the relay.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Get a copy of a session by ID
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|e| e.session.clone())
    }

    /// Snapshots of every connected session
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.sessions.iter().map(|e| e.session.snapshot()).collect()
    }

    pub(crate) fn insert(&self, session: Session, outbox: Outbox) {
        self.sessions
            .insert(session.id.clone(), SessionEntry { session, outbox });
    }

    /// Remove a session; dropping its outbox closes the connection's queue.
    pub(crate) fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .remove(session_id)
            .map(|(_, entry)| entry.session)
    }

    pub(crate) fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        self.sessions
            .get_mut(session_id)
            .map(|mut entry| f(&mut entry.session))
    }

    pub(crate) fn snapshots_except(&self, session_id: &str) -> Vec<Snapshot> {
        self.sessions
            .iter()
            .filter(|e| e.key() != session_id)
            .map(|e| e.session.snapshot())
            .collect()
    }

    pub(crate) fn stale_ids(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|e| e.session.is_stale(now, timeout))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Queue a message for one session. Returns false if it is gone.
    pub(crate) fn send_to(&self, session_id: &str, msg: ServerMessage) -> bool {
        match self.sessions.get(session_id) {
            Some(entry) => entry.outbox.send(msg).is_ok(),
            None => false,
        }
    }

    /// Queue a message for every session except `exclude`.
    ///
    /// A closed outbox is skipped; delivery to the rest continues.
    /// Returns the number of sessions the message was queued for.
    pub(crate) fn broadcast(&self, msg: &ServerMessage, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            if Some(entry.key().as_str()) == exclude {
                continue;
            }
            if entry.outbox.send(msg.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(session_id = %entry.key(), "Outbox closed, skipping recipient");
            }
        }
        delivered
    }

    pub(crate) fn clear(&self) {
        self.sessions.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
