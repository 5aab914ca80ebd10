use crate::config::ClientConfig;
use crate::protocol::{Equipment, MovementMode, ServerMessage, Snapshot};
use glam::{Mat4, Vec2, Vec3};
use std::collections::HashMap;
use std::f32::consts::{PI, TAU};
use std::time::Instant;
use tracing::{debug, info};


/// Locomotion cycle speed while walking (radians per second)
const WALK_PHASE_RATE: f32 = 8.0;
/// Locomotion cycle speed while running (radians per second)
const RUN_PHASE_RATE: f32 = 12.0;

const WALK_BOB_AMPLITUDE: f32 = 0.05;
const RUN_BOB_AMPLITUDE: f32 = 0.08;

/// Label opacity once a peer has gone quiet
pub const STALE_LABEL_OPACITY: f32 = 0.35;

/// Position and orientation of a remote entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceTransform {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl From<&Snapshot> for PresenceTransform {
    fn from(s: &Snapshot) -> Self {
        Self {
            position: Vec3::new(s.x, s.y, s.z),
            yaw: s.yaw,
            pitch: s.pitch,
        }
    }
}

/// Client-side mirror of another player
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    pub id: String,
    pub display_name: String,
    /// Presentation transform; only `Reconciler::step` writes it
    pub current: PresenceTransform,
    /// Latest reported transform; only inbound messages write it
    pub target: PresenceTransform,
    pub equipment: Equipment,
    pub combat_level: u32,
    pub movement_mode: MovementMode,
    pub last_update: Instant,
    pub movement_phase: f32,
    pub is_moving: bool,
}

impl RemoteEntity {
    fn from_snapshot(snapshot: &Snapshot, now: Instant) -> Self {
        let transform = PresenceTransform::from(snapshot);
        Self {
            id: snapshot.id.clone(),
            display_name: snapshot.name.clone(),
            current: transform,
            target: transform,
            equipment: snapshot.equipment.clone(),
            combat_level: snapshot.combat_level,
            movement_mode: MovementMode::from_running(snapshot.is_running),
            last_update: now,
            movement_phase: 0.0,
            is_moving: false,
        }
    }

    /// Vertical offset for locomotion animation; zero while standing still
    pub fn bob_offset(&self) -> f32 {
        if !self.is_moving {
            return 0.0;
        }
        let amplitude = match self.movement_mode {
            MovementMode::Walk => WALK_BOB_AMPLITUDE,
            MovementMode::Run => RUN_BOB_AMPLITUDE,
        };
        self.movement_phase.sin().abs() * amplitude
    }
}

/// Where (and how prominently) to draw a name label this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelPlacement {
    Hidden,
    Visible { screen: Vec2, opacity: f32 },
}

/// Scene/UI collaborator receiving the reconciler's output
pub trait Presentation {
    /// A peer appeared; build its visuals
    fn spawn(&mut self, entity: &RemoteEntity);
    /// A peer left; release everything bound to it
    fn despawn(&mut self, id: &str);
    /// Equipment changed; re-derive appearance
    fn appearance_changed(&mut self, entity: &RemoteEntity);
    fn place_label(&mut self, id: &str, label: LabelPlacement);
}

/// World-to-screen projection for name labels
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    view_proj: Mat4,
    viewport: Vec2,
}

impl Camera {
    pub fn new(view_proj: Mat4, viewport: Vec2) -> Self {
        Self {
            view_proj,
            viewport,
        }
    }

    /// Screen coordinates (pixels, origin top-left) of a world point, or
    /// `None` if its depth is outside the visible `[0, 1]` range.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_proj * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }
}

/// Wrap an angle difference once into `(-π, π]`
pub fn wrap_angle_once(diff: f32) -> f32 {
    if diff > PI {
        diff - TAU
    } else if diff <= -PI {
        diff + TAU
    } else {
        diff
    }
}

/// Keeps one `RemoteEntity` per peer and smooths it toward its latest target
pub struct Reconciler {
    config: ClientConfig,
    local_id: Option<String>,
    entities: HashMap<String, RemoteEntity>,
}

impl Reconciler {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            local_id: None,
            entities: HashMap::new(),
        }
    }

    /// Our own session id, known after `welcome`
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Parse and apply one inbound frame; malformed frames are dropped.
    pub fn apply_text(&mut self, text: &str, now: Instant, presentation: &mut impl Presentation) {
        match ServerMessage::parse(text) {
            Ok(msg) => self.apply(&msg, now, presentation),
            Err(e) => debug!(error = %e, "Dropping malformed server message"),
        }
    }

    pub fn apply(&mut self, msg: &ServerMessage, now: Instant, presentation: &mut impl Presentation) {
        match msg {
            ServerMessage::Welcome { id, players, .. } => {
                // A welcome starts a new session: drop whatever the old one knew
                self.reset(presentation);
                self.local_id = Some(id.clone());
                for snapshot in players {
                    self.upsert(snapshot, now, presentation);
                }
                info!(local_id = %id, peers = self.entities.len(), "Roster seeded");
            }
            ServerMessage::PlayerJoin(snapshot) | ServerMessage::PlayerUpdate(snapshot) => {
                self.upsert(snapshot, now, presentation);
            }
            ServerMessage::PlayerLeave { id } => {
                if self.entities.remove(id).is_some() {
                    presentation.despawn(id);
                    debug!(peer_id = %id, "Remote entity removed");
                }
            }
            ServerMessage::Chat { .. } => {}
        }
    }

    fn upsert(&mut self, snapshot: &Snapshot, now: Instant, presentation: &mut impl Presentation) {
        if self.local_id.as_deref() == Some(snapshot.id.as_str()) {
            return;
        }

        match self.entities.get_mut(&snapshot.id) {
            Some(entity) => {
                entity.target = PresenceTransform::from(snapshot);
                entity.display_name.clone_from(&snapshot.name);
                entity.combat_level = snapshot.combat_level;
                entity.movement_mode = MovementMode::from_running(snapshot.is_running);
                entity.last_update = now;
                if entity.equipment != snapshot.equipment {
                    entity.equipment = snapshot.equipment.clone();
                    presentation.appearance_changed(entity);
                }
            }
            None => {
                let entity = RemoteEntity::from_snapshot(snapshot, now);
                presentation.spawn(&entity);
                debug!(peer_id = %entity.id, name = %entity.display_name, "Remote entity created");
                self.entities.insert(snapshot.id.clone(), entity);
            }
        }
    }

    /// Forget every peer (transport lost); the next `welcome` reseeds.
    pub fn reset(&mut self, presentation: &mut impl Presentation) {
        for (id, _) in self.entities.drain() {
            presentation.despawn(&id);
        }
        self.local_id = None;
    }

    /// Advance every entity toward its target; called once per rendered frame.
    pub fn step(
        &mut self,
        dt: f32,
        now: Instant,
        camera: &Camera,
        presentation: &mut impl Presentation,
    ) {
        let alpha = (dt * self.config.lerp_factor).min(1.0);

        for entity in self.entities.values_mut() {
            let distance = entity.current.position.distance(entity.target.position);

            if distance > self.config.teleport_threshold {
                entity.current.position = entity.target.position;
            } else {
                entity.current.position = entity
                    .current
                    .position
                    .lerp(entity.target.position, alpha);
            }

            let yaw_diff = wrap_angle_once(entity.target.yaw - entity.current.yaw);
            entity.current.yaw = wrap_angle_once(entity.current.yaw + yaw_diff * alpha);
            entity.current.pitch += (entity.target.pitch - entity.current.pitch) * alpha;

            entity.is_moving = distance > self.config.movement_epsilon;
            if entity.is_moving {
                let rate = match entity.movement_mode {
                    MovementMode::Walk => WALK_PHASE_RATE,
                    MovementMode::Run => RUN_PHASE_RATE,
                };
                entity.movement_phase = (entity.movement_phase + dt * rate) % TAU;
            } else {
                entity.movement_phase = 0.0;
            }

            let anchor = entity.current.position + Vec3::Y * self.config.label_height;
            let label = match camera.project(anchor) {
                None => LabelPlacement::Hidden,
                Some(screen) => {
                    let silent_for = now.saturating_duration_since(entity.last_update);
                    let opacity = if silent_for.as_secs_f32() > self.config.label_stale_seconds {
                        STALE_LABEL_OPACITY
                    } else {
                        1.0
                    };
                    LabelPlacement::Visible { screen, opacity }
                }
            };
            presentation.place_label(&entity.id, label);
        }
    }
}
