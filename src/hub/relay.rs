use crate::config::RelayConfig;
use crate::hub::identity::{generate_display_name, next_session_id};
use crate::hub::registry::{Outbox, SessionRegistry};
use crate::hub::session::Session;
use crate::protocol::{ClientMessage, ServerMessage, StatePatch};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Session lifecycle and message dispatch over an injected registry.
///
/// Every operation runs to completion; the hub task calls them one at a time.
pub struct Relay {
    registry: Arc<SessionRegistry>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(registry: Arc<SessionRegistry>, config: RelayConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Register a new connection and announce it.
    ///
    /// The joiner receives `welcome` with every *other* session; every other
    /// session receives `player_join` for the joiner.
    pub fn connect(&self, outbox: Outbox, now: DateTime<Utc>) -> String {
        let id = next_session_id(now);
        let name = generate_display_name(&mut rand::thread_rng());
        let session = Session::new(id.clone(), name.clone(), now);
        let snapshot = session.snapshot();

        let players = self.registry.snapshots_except(&id);
        self.registry.insert(session, outbox);

        self.registry.send_to(
            &id,
            ServerMessage::Welcome {
                id: id.clone(),
                name: name.clone(),
                players,
            },
        );
        let notified = self
            .registry
            .broadcast(&ServerMessage::PlayerJoin(snapshot), Some(&id));

        info!(
            session_id = %id,
            name = %name,
            notified = notified,
            sessions = self.registry.len(),
            "Player joined"
        );
        id
    }

    /// Handle one raw text frame from a connection.
    ///
    /// Payloads that do not parse are dropped; the connection stays open.
    pub fn handle_text(&self, session_id: &str, text: &str, now: DateTime<Utc>) {
        match ClientMessage::parse(text) {
            Ok(msg) => self.handle_message(session_id, msg, now),
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Dropping malformed message");
            }
        }
    }

    pub fn handle_message(&self, session_id: &str, msg: ClientMessage, now: DateTime<Utc>) {
        match msg {
            ClientMessage::State(patch) => self.handle_state(session_id, &patch, now),
            ClientMessage::Chat { text } => self.handle_chat(session_id, &text, now),
            ClientMessage::Unknown => {
                debug!(session_id = %session_id, "Ignoring unknown message type");
                self.registry.update(session_id, |s| s.touch(now));
            }
        }
    }

    fn handle_state(&self, session_id: &str, patch: &StatePatch, now: DateTime<Utc>) {
        let snapshot = self.registry.update(session_id, |session| {
            session.apply_patch(patch, now);
            session.snapshot()
        });

        if let Some(snapshot) = snapshot {
            self.registry
                .broadcast(&ServerMessage::PlayerUpdate(snapshot), Some(session_id));
        }
    }

    fn handle_chat(&self, session_id: &str, text: &str, now: DateTime<Utc>) {
        let Some(name) = self.registry.update(session_id, |session| {
            session.touch(now);
            session.display_name.clone()
        }) else {
            return;
        };

        let text = sanitize_chat(text, self.config.chat_max_chars);
        if text.is_empty() {
            return;
        }

        debug!(session_id = %session_id, len = text.len(), "Chat");
        // Senders rely on this broadcast for their own echo
        self.registry.broadcast(
            &ServerMessage::Chat {
                id: session_id.to_string(),
                name,
                text,
            },
            None,
        );
    }

    /// Remove a session and announce its departure.
    ///
    /// Graceful close, transport error and eviction all end here. Returns
    /// false (and broadcasts nothing) if the session was already gone.
    pub fn disconnect(&self, session_id: &str) -> bool {
        let Some(session) = self.registry.remove(session_id) else {
            return false;
        };

        self.registry.broadcast(
            &ServerMessage::PlayerLeave {
                id: session_id.to_string(),
            },
            None,
        );

        info!(
            session_id = %session_id,
            name = %session.display_name,
            sessions = self.registry.len(),
            "Player left"
        );
        true
    }

    /// Evict every session inactive for longer than the stale timeout.
    ///
    /// Removing a session drops its outbox, which terminates the connection.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        let stale = self
            .registry
            .stale_ids(now, self.config.stale_timeout());

        for id in &stale {
            info!(session_id = %id, "Evicting stale session");
            self.disconnect(id);
        }
        stale
    }

    /// Drop every session without announcements (hub shutdown).
    pub fn close_all(&self) {
        let count = self.registry.len();
        self.registry.clear();
        info!(sessions = count, "Closed all sessions");
    }
}

/// Trim and truncate chat text to at most `max_chars` characters.
pub fn sanitize_chat(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
