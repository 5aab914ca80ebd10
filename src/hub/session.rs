use crate::protocol::{Equipment, MovementMode, Snapshot, StatePatch};
use chrono::{DateTime, Utc};

/// Height of the spawn point above the ground plane
pub const SPAWN_HEIGHT: f32 = 1.8;

/// Combat level assigned to a freshly connected player
pub const DEFAULT_COMBAT_LEVEL: u32 = 3;

/// Position and orientation reported by a client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl Transform {
    pub fn spawn() -> Self {
        Self {
            x: 0.0,
            y: SPAWN_HEIGHT,
            z: 0.0,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

/// Server-side record of one connected player
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Unique for the process lifetime (see `identity::next_session_id`)
    pub id: String,
    pub display_name: String,
    pub transform: Transform,
    pub equipment: Equipment,
    pub combat_level: u32,
    pub movement_mode: MovementMode,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, display_name: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name,
            transform: Transform::spawn(),
            equipment: Equipment::new(),
            combat_level: DEFAULT_COMBAT_LEVEL,
            movement_mode: MovementMode::Walk,
            connected_at: now,
            last_activity: now,
        }
    }

    /// Merge the fields present in `patch`; everything else keeps its value.
    pub fn apply_patch(&mut self, patch: &StatePatch, now: DateTime<Utc>) {
        if let Some(x) = patch.x {
            self.transform.x = x;
        }
        if let Some(y) = patch.y {
            self.transform.y = y;
        }
        if let Some(z) = patch.z {
            self.transform.z = z;
        }
        if let Some(yaw) = patch.yaw {
            self.transform.yaw = yaw;
        }
        if let Some(pitch) = patch.pitch {
            self.transform.pitch = pitch;
        }
        if let Some(equipment) = &patch.equipment {
            self.equipment = equipment.clone();
        }
        if let Some(level) = patch.combat_level {
            self.combat_level = level;
        }
        if let Some(running) = patch.is_running {
            self.movement_mode = MovementMode::from_running(running);
        }
        self.touch(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// True when no activity has been seen for longer than `timeout`
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity) > timeout
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id.clone(),
            name: self.display_name.clone(),
            x: self.transform.x,
            y: self.transform.y,
            z: self.transform.z,
            yaw: self.transform.yaw,
            pitch: self.transform.pitch,
            equipment: self.equipment.clone(),
            combat_level: self.combat_level,
            is_running: self.movement_mode.is_running(),
        }
    }
}
