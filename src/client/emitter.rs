use crate::config::ClientConfig;
use crate::protocol::{ClientMessage, Equipment, StatePatch};

/// The local player's reportable state
#[derive(Debug, Clone, PartialEq)]
pub struct LocalState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub equipment: Equipment,
    pub combat_level: u32,
    pub is_running: bool,
}

/// Rate-limits outbound `state` messages and sends only what changed.
///
/// A player standing still still sends its position every `keepalive`
/// seconds so the relay keeps the session alive.
pub struct StateEmitter {
    interval: f32,
    keepalive: f32,
    elapsed: f32,
    since_send: f32,
    last_sent: Option<LocalState>,
}

impl StateEmitter {
    pub fn new(send_rate_hz: f32, keepalive_seconds: f32) -> Self {
        let interval = if send_rate_hz > 0.0 {
            1.0 / send_rate_hz
        } else {
            f32::INFINITY
        };
        Self {
            interval,
            keepalive: keepalive_seconds.max(0.0),
            elapsed: 0.0,
            since_send: 0.0,
            last_sent: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.send_rate_hz, config.keepalive_seconds)
    }

    /// Forget what was sent; the next emission carries every field.
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.elapsed = 0.0;
        self.since_send = 0.0;
    }

    /// Advance by `dt` seconds; returns a message when a send is due and
    /// something changed since the previous one, or the keepalive has lapsed.
    pub fn advance(&mut self, dt: f32, local: &LocalState) -> Option<ClientMessage> {
        self.elapsed += dt;
        self.since_send += dt;
        if self.elapsed < self.interval {
            return None;
        }
        // Carry the overshoot; a long stall yields one send, not a burst
        self.elapsed %= self.interval;

        let mut patch = diff(self.last_sent.as_ref(), local);
        if patch.is_empty() {
            if self.since_send < self.keepalive {
                return None;
            }
            patch = StatePatch {
                x: Some(local.x),
                y: Some(local.y),
                z: Some(local.z),
                ..StatePatch::default()
            };
        }
        self.since_send = 0.0;
        self.last_sent = Some(local.clone());
        Some(ClientMessage::State(patch))
    }
}

fn changed<T: PartialEq + Clone>(previous: Option<&T>, current: &T) -> Option<T> {
    match previous {
        Some(p) if p == current => None,
        _ => Some(current.clone()),
    }
}

fn diff(previous: Option<&LocalState>, current: &LocalState) -> StatePatch {
    StatePatch {
        x: changed(previous.map(|p| &p.x), &current.x),
        y: changed(previous.map(|p| &p.y), &current.y),
        z: changed(previous.map(|p| &p.z), &current.z),
        yaw: changed(previous.map(|p| &p.yaw), &current.yaw),
        pitch: changed(previous.map(|p| &p.pitch), &current.pitch),
        equipment: changed(previous.map(|p| &p.equipment), &current.equipment),
        combat_level: changed(previous.map(|p| &p.combat_level), &current.combat_level),
        is_running: changed(previous.map(|p| &p.is_running), &current.is_running),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalState {
        LocalState {
            x: 0.0,
            y: 1.8,
            z: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            equipment: Equipment::new(),
            combat_level: 3,
            is_running: false,
        }
    }

    fn patch(msg: Option<ClientMessage>) -> StatePatch {
        match msg {
            Some(ClientMessage::State(patch)) => patch,
            other => panic!("expected state message, got {:?}", other),
        }
    }

    #[test]
    fn test_first_send_is_full_state() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let p = patch(emitter.advance(0.1, &local()));
        assert_eq!(p.y, Some(1.8));
        assert_eq!(p.combat_level, Some(3));
        assert_eq!(p.equipment, Some(Equipment::new()));
    }

    #[test]
    fn test_respects_send_rate() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let mut state = local();
        assert!(emitter.advance(0.05, &state).is_none());
        assert!(emitter.advance(0.06, &state).is_some());

        state.x = 1.0;
        assert!(emitter.advance(0.02, &state).is_none());
    }

    #[test]
    fn test_subsequent_sends_are_partial() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let mut state = local();
        emitter.advance(0.1, &state);

        state.x = 10.0;
        state.is_running = true;
        let p = patch(emitter.advance(0.1, &state));
        assert_eq!(
            p,
            StatePatch {
                x: Some(10.0),
                is_running: Some(true),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_nothing_sent_when_unchanged() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let state = local();
        emitter.advance(0.1, &state);
        assert!(emitter.advance(0.1, &state).is_none());
    }

    #[test]
    fn test_reset_resends_everything() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let state = local();
        emitter.advance(0.1, &state);
        emitter.reset();
        let p = patch(emitter.advance(0.1, &state));
        assert_eq!(p.x, Some(0.0));
    }

    #[test]
    fn test_idle_player_sends_keepalive_position() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let state = local();
        emitter.advance(0.1, &state);

        let mut sent = Vec::new();
        // 61s of fixed steps with nothing changing
        for _ in 0..(61 * 60) {
            if let Some(msg) = emitter.advance(1.0 / 60.0, &state) {
                sent.push(patch(Some(msg)));
            }
        }

        assert!(sent.len() >= 11, "only {} keepalives in 61s", sent.len());
        assert_eq!(
            sent[0],
            StatePatch {
                x: Some(0.0),
                y: Some(1.8),
                z: Some(0.0),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_send_rate_keeps_overshoot() {
        let mut emitter = StateEmitter::new(10.0, 5.0);
        let mut state = local();
        let mut sends = 0;
        // 20 steps of 70ms: 1.4s at 10 Hz
        for i in 0..20 {
            state.x = i as f32;
            if emitter.advance(0.07, &state).is_some() {
                sends += 1;
            }
        }
        assert!(sends >= 13, "only {} sends in 1.4s", sends);
    }

    #[test]
    fn test_zero_rate_never_sends() {
        let mut emitter = StateEmitter::new(0.0, 5.0);
        assert!(emitter.advance(1000.0, &local()).is_none());
    }
}
