// Client-side presence: frame scheduling, remote entity smoothing, state emission

pub mod emitter;
pub mod reconciler;
pub mod scheduler;

pub use emitter::{LocalState, StateEmitter};
pub use reconciler::{
    wrap_angle_once, Camera, LabelPlacement, PresenceTransform, Presentation, Reconciler,
    RemoteEntity,
};
pub use scheduler::{
    run_paced, FrameReport, FrameRequester, ManualFrames, Scheduler, SchedulerStatus,
};
