use crate::config::SchedulerConfig;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Capability to have `Scheduler::frame` invoked again later.
///
/// Implemented by whatever drives frames: a display callback, a timer, or a
/// test harness.
pub trait FrameRequester {
    fn request_frame(&mut self);
    fn cancel_frame(&mut self);
}

/// Pending-flag requester; the driver polls `take_pending` to decide whether
/// to run another frame.
#[derive(Debug, Default)]
pub struct ManualFrames {
    pending: bool,
    requested: u64,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the outstanding request, if any
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Total number of frame requests ever made
    pub fn requested(&self) -> u64 {
        self.requested
    }
}

impl FrameRequester for ManualFrames {
    fn request_frame(&mut self) {
        self.pending = true;
        self.requested += 1;
    }

    fn cancel_frame(&mut self) {
        self.pending = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Stopped,
    Running,
}

/// Work done by one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub fixed_steps: u32,
    pub ticks: u32,
    pub alpha: f64,
}

#[derive(Debug)]
struct SchedulerState {
    fixed_accumulator: f64,
    tick_accumulator: f64,
    last_timestamp: Instant,
}

type StepFn = Box<dyn FnMut(f64)>;
type TickFn = Box<dyn FnMut()>;

/// Fixed-step accumulator loop producing physics, tick and render cadences
pub struct Scheduler<R: FrameRequester> {
    config: SchedulerConfig,
    requester: R,
    /// `Some` while running
    state: Option<SchedulerState>,
    on_fixed_step: Option<StepFn>,
    on_tick: Option<TickFn>,
    on_render: Option<StepFn>,
}

impl<R: FrameRequester> Scheduler<R> {
    pub fn new(config: SchedulerConfig, requester: R) -> Self {
        Self {
            config: config.clamped(),
            requester,
            state: None,
            on_fixed_step: None,
            on_tick: None,
            on_render: None,
        }
    }

    /// Physics callback, called with the fixed step in seconds
    pub fn on_fixed_step(&mut self, f: impl FnMut(f64) + 'static) {
        self.on_fixed_step = Some(Box::new(f));
    }

    /// Discrete game tick callback
    pub fn on_tick(&mut self, f: impl FnMut() + 'static) {
        self.on_tick = Some(Box::new(f));
    }

    /// Render callback, called with the interpolation fraction
    pub fn on_render(&mut self, f: impl FnMut(f64) + 'static) {
        self.on_render = Some(Box::new(f));
    }

    pub fn status(&self) -> SchedulerStatus {
        if self.state.is_some() {
            SchedulerStatus::Running
        } else {
            SchedulerStatus::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    pub fn requester_mut(&mut self) -> &mut R {
        &mut self.requester
    }

    /// Start the loop. Returns false (and does nothing) if already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.state.is_some() {
            return false;
        }
        self.state = Some(SchedulerState {
            fixed_accumulator: 0.0,
            tick_accumulator: 0.0,
            last_timestamp: now,
        });
        self.requester.request_frame();
        debug!("Scheduler started");
        true
    }

    /// Stop the loop; no callback fires after this returns.
    pub fn stop(&mut self) {
        if self.state.take().is_some() {
            self.requester.cancel_frame();
            debug!("Scheduler stopped");
        }
    }

    /// Run one frame. Ignored (returns `None`) while stopped.
    pub fn frame(&mut self, now: Instant) -> Option<FrameReport> {
        let fixed_step = self.config.fixed_step_seconds;
        let tick_duration = self.config.tick_seconds;
        let max_delta = self.config.max_frame_delta_seconds;

        let state = self.state.as_mut()?;

        let frame_delta = now
            .saturating_duration_since(state.last_timestamp)
            .as_secs_f64()
            .min(max_delta);
        state.last_timestamp = now;

        let mut report = FrameReport {
            fixed_steps: 0,
            ticks: 0,
            alpha: 0.0,
        };

        state.fixed_accumulator += frame_delta;
        while state.fixed_accumulator >= fixed_step {
            if let Some(f) = self.on_fixed_step.as_mut() {
                f(fixed_step);
            }
            state.fixed_accumulator -= fixed_step;
            report.fixed_steps += 1;
        }

        state.tick_accumulator += frame_delta;
        while state.tick_accumulator >= tick_duration {
            if let Some(f) = self.on_tick.as_mut() {
                f();
            }
            state.tick_accumulator -= tick_duration;
            report.ticks += 1;
        }

        report.alpha = state.fixed_accumulator / fixed_step;
        if let Some(f) = self.on_render.as_mut() {
            f(report.alpha);
        }

        self.requester.request_frame();
        Some(report)
    }
}

/// Drive a scheduler from a tokio interval until `shutdown` turns true.
pub async fn run_paced(
    scheduler: &mut Scheduler<ManualFrames>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    scheduler.start(Instant::now());
    info!(period_ms = period.as_millis() as u64, "Frame loop running");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !scheduler.requester_mut().take_pending() {
                    break;
                }
                scheduler.frame(Instant::now());
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    scheduler.stop();
    info!("Frame loop stopped");
}
