use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Complete presence relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresenceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// HTTP/WebSocket listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Relay hub configuration (sweeper cadence, chat limits)
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// How often the staleness sweeper runs (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Inactivity after which a session is evicted (seconds)
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_seconds: u64,
    /// Maximum chat length in characters after trimming
    #[serde(default = "default_chat_max_chars")]
    pub chat_max_chars: usize,
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_stale_timeout() -> u64 {
    60
}

fn default_chat_max_chars() -> usize {
    100
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
            stale_timeout_seconds: default_stale_timeout(),
            chat_max_chars: default_chat_max_chars(),
        }
    }
}

/// Upper bound on the sweeper period (one day)
const MAX_SWEEP_INTERVAL_SECONDS: u64 = 86_400;

impl RelayConfig {
    /// Sweeper period, kept within one second and one day
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(
            self.sweep_interval_seconds
                .clamp(1, MAX_SWEEP_INTERVAL_SECONDS),
        )
    }

    /// Inactivity timeout; saturates instead of overflowing for huge values
    pub fn stale_timeout(&self) -> chrono::Duration {
        i64::try_from(self.stale_timeout_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Client-side presence tuning (send rate, smoothing, labels)
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Outbound `state` messages per second
    #[serde(default = "default_send_rate")]
    pub send_rate_hz: f32,
    /// Exponential smoothing responsiveness
    #[serde(default = "default_lerp_factor")]
    pub lerp_factor: f32,
    /// Distance beyond which remote entities snap instead of sliding
    #[serde(default = "default_teleport_threshold")]
    pub teleport_threshold: f32,
    /// Distance under which a remote entity counts as standing still
    #[serde(default = "default_movement_epsilon")]
    pub movement_epsilon: f32,
    /// Seconds without an update before a name label fades
    #[serde(default = "default_label_stale")]
    pub label_stale_seconds: f32,
    /// Height above the entity origin where the name label is anchored
    #[serde(default = "default_label_height")]
    pub label_height: f32,
    /// Seconds of unchanged state before the position is resent anyway
    #[serde(default = "default_keepalive")]
    pub keepalive_seconds: f32,
}

fn default_send_rate() -> f32 {
    10.0
}

fn default_lerp_factor() -> f32 {
    10.0
}

fn default_teleport_threshold() -> f32 {
    20.0
}

fn default_movement_epsilon() -> f32 {
    0.05
}

fn default_label_stale() -> f32 {
    15.0
}

fn default_label_height() -> f32 {
    2.2
}

fn default_keepalive() -> f32 {
    5.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_rate_hz: default_send_rate(),
            lerp_factor: default_lerp_factor(),
            teleport_threshold: default_teleport_threshold(),
            movement_epsilon: default_movement_epsilon(),
            label_stale_seconds: default_label_stale(),
            label_height: default_label_height(),
            keepalive_seconds: default_keepalive(),
        }
    }
}

/// Fixed-step scheduler cadences (seconds)
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_fixed_step")]
    pub fixed_step_seconds: f64,
    #[serde(default = "default_tick")]
    pub tick_seconds: f64,
    /// Upper bound on a single frame delta ("spiral of death" guard)
    #[serde(default = "default_max_frame_delta")]
    pub max_frame_delta_seconds: f64,
}

fn default_fixed_step() -> f64 {
    1.0 / 60.0
}

fn default_tick() -> f64 {
    0.6
}

fn default_max_frame_delta() -> f64 {
    0.25
}

/// Smallest accepted fixed step or tick duration (seconds)
pub const MIN_STEP_SECONDS: f64 = 0.001;

impl SchedulerConfig {
    /// Replace non-positive or non-finite cadences with usable bounds.
    pub fn clamped(self) -> Self {
        fn finite_or(v: f64, fallback: f64) -> f64 {
            if v.is_finite() {
                v
            } else {
                fallback
            }
        }
        Self {
            fixed_step_seconds: finite_or(self.fixed_step_seconds, default_fixed_step())
                .max(MIN_STEP_SECONDS),
            tick_seconds: finite_or(self.tick_seconds, default_tick()).max(MIN_STEP_SECONDS),
            max_frame_delta_seconds: finite_or(
                self.max_frame_delta_seconds,
                default_max_frame_delta(),
            )
            .max(0.0),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fixed_step_seconds: default_fixed_step(),
            tick_seconds: default_tick(),
            max_frame_delta_seconds: default_max_frame_delta(),
        }
    }
}

impl PresenceConfig {
    /// Apply `PRESENCE_*` environment overrides on top of file/default values.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PRESENCE_BIND_ADDR") {
            if !v.trim().is_empty() {
                self.server.bind_addr = v;
            }
        }
        if let Ok(v) = std::env::var("PRESENCE_SWEEP_INTERVAL_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.relay.sweep_interval_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("PRESENCE_STALE_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.relay.stale_timeout_seconds = n;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<PresenceConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PresenceConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist,
/// then apply environment overrides.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<PresenceConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        info!(path = %path.display(), "Loading configuration");
        load_config(path)?
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        PresenceConfig::default()
    };
    config.apply_env();
    Ok(config)
}
