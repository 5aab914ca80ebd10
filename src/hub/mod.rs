// Relay hub: session registry, dispatch, fan-out and the staleness sweeper

pub mod identity;
mod registry;
mod relay;
mod session;

pub use registry::{Outbox, SessionRegistry};
pub use relay::{sanitize_chat, Relay};
pub use session::{Session, Transform, DEFAULT_COMBAT_LEVEL, SPAWN_HEIGHT};


use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Events processed by the hub task, strictly in arrival order
enum HubCommand {
    Connect {
        outbox: Outbox,
        reply: oneshot::Sender<String>,
    },
    Inbound {
        session_id: String,
        text: String,
    },
    Disconnect {
        session_id: String,
    },
    Shutdown,
}

/// Cloneable handle used by connection tasks to talk to the hub
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
    registry: Arc<SessionRegistry>,
}

impl HubHandle {
    /// Register a connection; returns its session id once `welcome` is queued.
    pub async fn connect(&self, outbox: Outbox) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Connect { outbox, reply })
            .map_err(|_| anyhow!("Hub is not running"))?;
        rx.await.map_err(|_| anyhow!("Hub stopped before accepting connection"))
    }

    /// Forward one inbound text frame
    pub fn inbound(&self, session_id: &str, text: String) {
        let _ = self.tx.send(HubCommand::Inbound {
            session_id: session_id.to_string(),
            text,
        });
    }

    /// Report a closed or failed connection
    pub fn disconnect(&self, session_id: &str) {
        let _ = self.tx.send(HubCommand::Disconnect {
            session_id: session_id.to_string(),
        });
    }

    /// Stop the hub task (and its sweeper)
    pub fn shutdown(&self) {
        let _ = self.tx.send(HubCommand::Shutdown);
    }

    /// Read-only view of the live sessions
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

/// Wall-clock timestamps that advance with the runtime's monotonic clock
struct HubClock {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl HubClock {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or(chrono::TimeDelta::MAX);
        self.started_at
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Single task owning the relay; the sweeper runs as an arm of its loop
pub struct Hub {
    relay: Relay,
    rx: mpsc::UnboundedReceiver<HubCommand>,
    clock: HubClock,
}

impl Hub {
    /// Spawn the hub task. The sweeper starts with it and stops with it.
    pub fn spawn(relay: Relay) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = HubHandle {
            tx,
            registry: Arc::clone(relay.registry()),
        };
        let hub = Hub {
            relay,
            rx,
            clock: HubClock::new(),
        };
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    async fn run(mut self) {
        let period = self.relay.config().sweep_interval();
        let mut sweeper = interval_at(Instant::now() + period, period);
        sweeper.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            sweep_interval_seconds = period.as_secs(),
            stale_timeout_seconds = self.relay.config().stale_timeout_seconds,
            "Relay hub started"
        );

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(HubCommand::Connect { outbox, reply }) => {
                            let id = self.relay.connect(outbox, self.clock.now());
                            if reply.send(id.clone()).is_err() {
                                // Connection task vanished before learning its id
                                self.relay.disconnect(&id);
                            }
                        }
                        Some(HubCommand::Inbound { session_id, text }) => {
                            self.relay.handle_text(&session_id, &text, self.clock.now());
                        }
                        Some(HubCommand::Disconnect { session_id }) => {
                            self.relay.disconnect(&session_id);
                        }
                        Some(HubCommand::Shutdown) | None => break,
                    }
                }

                _ = sweeper.tick() => {
                    let evicted = self.relay.sweep(self.clock.now());
                    if !evicted.is_empty() {
                        warn!(evicted = evicted.len(), "Staleness sweep evicted sessions");
                    }
                }
            }
        }

        self.relay.close_all();
        info!("Relay hub stopped");
    }
}
