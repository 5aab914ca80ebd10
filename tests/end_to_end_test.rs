// End-to-end presence flow: two clients through a live hub task, with the
// receiving side smoothed by a reconciler driven from the scheduler's render
// cadence.

use glam::{Mat4, Vec2};
use presence::client::{
    Camera, LabelPlacement, LocalState, ManualFrames, Presentation, Reconciler, RemoteEntity,
    Scheduler, StateEmitter,
};
use presence::config::{ClientConfig, RelayConfig, SchedulerConfig};
use presence::hub::{Hub, Relay, SessionRegistry};
use presence::protocol::{Equipment, ServerMessage};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Default)]
struct NullPresentation;

impl Presentation for NullPresentation {
    fn spawn(&mut self, _entity: &RemoteEntity) {}
    fn despawn(&mut self, _id: &str) {}
    fn appearance_changed(&mut self, _entity: &RemoteEntity) {}
    fn place_label(&mut self, _id: &str, _label: LabelPlacement) {}
}

/// Receive the next message and feed it through the wire format.
async fn deliver(
    rx: &mut UnboundedReceiver<ServerMessage>,
    reconciler: &mut Reconciler,
    presentation: &mut NullPresentation,
) -> ServerMessage {
    let msg = rx.recv().await.expect("hub closed the connection");
    let json = msg.to_json().unwrap();
    reconciler.apply_text(&json, Instant::now(), presentation);
    msg
}

#[tokio::test]
async fn test_remote_state_converges_after_render_steps() {
    let registry = Arc::new(SessionRegistry::new());
    let (hub, task) = Hub::spawn(Relay::new(registry, RelayConfig::default()));
    let mut presentation = NullPresentation;

    // Peer A connects and gets an empty roster
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let a = hub.connect(tx_a).await.unwrap();
    let mut reconciler_a = Reconciler::new(ClientConfig::default());
    match deliver(&mut rx_a, &mut reconciler_a, &mut presentation).await {
        ServerMessage::Welcome { players, .. } => assert!(players.is_empty()),
        other => panic!("expected welcome, got {:?}", other),
    }
    assert!(reconciler_a.is_empty());

    // Peer B connects and sees A; A is told about B
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let b = hub.connect(tx_b).await.unwrap();
    let mut reconciler_b = Reconciler::new(ClientConfig::default());
    match deliver(&mut rx_b, &mut reconciler_b, &mut presentation).await {
        ServerMessage::Welcome { players, .. } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id, a);
        }
        other => panic!("expected welcome, got {:?}", other),
    }
    assert!(reconciler_b.get(&a).is_some());

    assert!(matches!(
        deliver(&mut rx_a, &mut reconciler_a, &mut presentation).await,
        ServerMessage::PlayerJoin(ref s) if s.id == b
    ));
    assert_eq!(reconciler_a.get(&b).unwrap().current.position.x, 0.0);

    // B reports x = 10 through its emitter (first send carries the full state)
    let mut emitter = StateEmitter::from_config(&ClientConfig::default());
    let local_b = LocalState {
        x: 10.0,
        y: 1.8,
        z: 0.0,
        yaw: 0.0,
        pitch: 0.0,
        equipment: Equipment::new(),
        combat_level: 3,
        is_running: false,
    };
    let outbound = emitter.advance(0.1, &local_b).expect("state is due");
    hub.inbound(&b, serde_json::to_string(&outbound).unwrap());

    assert!(matches!(
        deliver(&mut rx_a, &mut reconciler_a, &mut presentation).await,
        ServerMessage::PlayerUpdate(ref s) if s.id == b && s.x == 10.0
    ));

    // Render cadence advances A's view of B
    let reconciler_a = Rc::new(RefCell::new(reconciler_a));
    let mut scheduler = Scheduler::new(SchedulerConfig::default(), ManualFrames::new());
    let camera = Camera::new(Mat4::IDENTITY, Vec2::new(800.0, 600.0));
    let frame_dt = Duration::from_millis(16);
    {
        let reconciler = Rc::clone(&reconciler_a);
        scheduler.on_render(move |_alpha| {
            reconciler.borrow_mut().step(
                frame_dt.as_secs_f32(),
                Instant::now(),
                &camera,
                &mut NullPresentation,
            );
        });
    }

    let t0 = Instant::now();
    scheduler.start(t0);
    let mut frames = 0u32;
    while scheduler.requester_mut().take_pending() && frames < 180 {
        frames += 1;
        scheduler.frame(t0 + frame_dt * frames);
    }
    scheduler.stop();

    let x = reconciler_a.borrow().get(&b).unwrap().current.position.x;
    assert!((x - 10.0).abs() < 1e-3, "x = {}", x);

    // B leaves; A forgets it
    hub.disconnect(&b);
    drop(scheduler);
    let mut reconciler_a = Rc::try_unwrap(reconciler_a)
        .ok()
        .expect("scheduler callbacks dropped")
        .into_inner();
    assert!(matches!(
        deliver(&mut rx_a, &mut reconciler_a, &mut presentation).await,
        ServerMessage::PlayerLeave { ref id } if *id == b
    ));
    assert!(reconciler_a.get(&b).is_none());

    hub.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_chat_echoes_to_sender() {
    let (hub, task) = Hub::spawn(Relay::new(
        Arc::new(SessionRegistry::new()),
        RelayConfig::default(),
    ));

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let a = hub.connect(tx_a).await.unwrap();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let _b = hub.connect(tx_b).await.unwrap();

    // welcome + player_join for A, welcome for B
    rx_a.recv().await.unwrap();
    rx_a.recv().await.unwrap();
    rx_b.recv().await.unwrap();

    hub.inbound(&a, r#"{"type":"chat","text":"  hello there  "}"#.to_string());

    for rx in [&mut rx_a, &mut rx_b] {
        match rx.recv().await.unwrap() {
            ServerMessage::Chat { id, text, .. } => {
                assert_eq!(id, a);
                assert_eq!(text, "hello there");
            }
            other => panic!("expected chat, got {:?}", other),
        }
    }

    hub.shutdown();
    task.await.unwrap();
}

#[test]
fn test_idle_player_survives_staleness_sweep() {
    let relay = Relay::new(Arc::new(SessionRegistry::new()), RelayConfig::default());
    let t0 = Utc::now();
    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let a = relay.connect(tx_a, t0);
    let (tx_b, _rx_b) = mpsc::unbounded_channel();
    let b = relay.connect(tx_b, t0);

    // A stands still for 61s, stepping its emitter at the fixed rate
    let mut emitter = StateEmitter::from_config(&ClientConfig::default());
    let standing = LocalState {
        x: 4.0,
        y: 1.8,
        z: -2.0,
        yaw: 0.0,
        pitch: 0.0,
        equipment: Equipment::new(),
        combat_level: 3,
        is_running: false,
    };
    let step_ms = 1000 / 60;
    let mut sent = 0;
    for i in 1..=(61 * 60) {
        if let Some(msg) = emitter.advance(1.0 / 60.0, &standing) {
            let now = t0 + chrono::Duration::milliseconds(i * step_ms);
            relay.handle_text(&a, &serde_json::to_string(&msg).unwrap(), now);
            sent += 1;
        }
    }
    assert!(sent > 1);

    let evicted = relay.sweep(t0 + chrono::Duration::seconds(61));
    assert_eq!(evicted, vec![b]);
    assert!(relay.registry().contains(&a));
}
