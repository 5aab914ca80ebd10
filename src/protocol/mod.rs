use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(test)]
mod tests;

/// Equipment slot -> item id (`None` for an empty slot)
pub type Equipment = BTreeMap<String, Option<String>>;

/// Walk/run locomotion mode reported by a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    #[default]
    Walk,
    Run,
}

impl MovementMode {
    pub fn from_running(is_running: bool) -> Self {
        if is_running {
            MovementMode::Run
        } else {
            MovementMode::Walk
        }
    }

    pub fn is_running(self) -> bool {
        self == MovementMode::Run
    }
}

/// Externally visible projection of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub equipment: Equipment,
    pub combat_level: u32,
    pub is_running: bool,
}

/// Partial `state` payload; absent fields leave the session untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<Equipment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combat_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        *self == StatePatch::default()
    }
}

/// Client → Server message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    State(StatePatch),
    Chat { text: String },
    /// Any tag this relay does not know about
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Server → Client message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        id: String,
        name: String,
        players: Vec<Snapshot>,
    },
    PlayerJoin(Snapshot),
    PlayerUpdate(Snapshot),
    PlayerLeave {
        id: String,
    },
    Chat {
        id: String,
        name: String,
        text: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
