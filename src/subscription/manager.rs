use crate::subscription::adapter::{Change, Subscription};
use crate::subscription::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use tracing::{error, info, warn};

/// Bridges one WebSocket client to one hub subscription
pub struct ConnectionManager {
    subscription: Subscription,
}

impl ConnectionManager {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Handle WebSocket connection lifecycle.
    ///
    /// The subscription is dropped (and the observer unregistered) when the
    /// socket closes.
    pub async fn handle(mut self, mut socket: WebSocket) {
        let observer = self.subscription.id();
        info!(observer = %observer, "WebSocket connection established");

        // Current state first so the client does not wait for the next event
        let initial = [
            ServerMessage::Status {
                status: self.subscription.current_status(),
            },
            ServerMessage::Snapshot {
                locations: self.subscription.current_snapshot(),
            },
        ];
        for msg in initial {
            if let Err(e) = send(&mut socket, &msg).await {
                error!(error = %e, "Failed to send initial state");
                return;
            }
        }

        loop {
            tokio::select! {
                // Handle incoming client messages
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_client_message(&mut socket, &text).await {
                                error!(error = %e, "Error handling client message");
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Forward hub changes
                change = self.subscription.next_change() => {
                    let msg = match change {
                        Some(Change::Locations(locations)) => ServerMessage::Snapshot { locations },
                        Some(Change::Status(status)) => ServerMessage::Status { status },
                        None => {
                            error!("Location hub stopped");
                            break;
                        }
                    };

                    if let Err(e) = send(&mut socket, &msg).await {
                        error!(error = %e, "Failed to send update");
                        break;
                    }
                }

                else => {
                    break;
                }
            }
        }

        info!(observer = %observer, "WebSocket connection closed");
    }

    /// Handle client message (refresh)
    async fn handle_client_message(
        &mut self,
        socket: &mut WebSocket,
        text: &str,
    ) -> anyhow::Result<()> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Refresh) => {
                info!(observer = %self.subscription.id(), "Client requested refresh");
                self.subscription.refresh();
            }
            Err(e) => {
                let msg = ServerMessage::Error {
                    error: format!("invalid message: {}", e),
                };
                send(socket, &msg).await?;
            }
        }

        Ok(())
    }
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
