use crate::hub::HubHandle;
use crate::protocol::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Manages a single WebSocket connection bound to one hub session
pub struct ConnectionManager {
    hub: HubHandle,
}

/// Why a connection loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    TransportError,
    Evicted,
}

impl ConnectionManager {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// Handle WebSocket connection lifecycle
    ///
    /// Close, transport error and eviction all converge on a single
    /// `disconnect` to the hub; the hub ignores ids it already removed.
    pub async fn handle(self, mut socket: WebSocket) {
        let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();

        let session_id = match self.hub.connect(outbox).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to register connection");
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        };

        info!(session_id = %session_id, "WebSocket connection established");

        let reason = loop {
            tokio::select! {
                // Handle incoming client messages
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.hub.inbound(&session_id, text);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            break CloseReason::ClientClosed;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                warn!(session_id = %session_id, error = %e, "Failed to send pong");
                                break CloseReason::TransportError;
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            warn!(session_id = %session_id, error = %e, "WebSocket error");
                            break CloseReason::TransportError;
                        }
                    }
                }

                // Forward hub messages queued for this session
                out = inbox.recv() => {
                    match out {
                        Some(msg) => {
                            if let Err(e) = send_message(&mut socket, &msg).await {
                                warn!(session_id = %session_id, error = %e, "Failed to send message");
                                break CloseReason::TransportError;
                            }
                        }
                        // Outbox dropped by the hub: session evicted or hub stopped
                        None => break CloseReason::Evicted,
                    }
                }
            }
        };

        if reason == CloseReason::Evicted {
            let _ = socket.send(Message::Close(None)).await;
        }

        self.hub.disconnect(&session_id);
        debug!(session_id = %session_id, reason = ?reason, "Connection loop ended");
        info!(session_id = %session_id, "WebSocket connection closed");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> anyhow::Result<()> {
    let json = msg.to_json()?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
