use crate::resource::{Notification, Observation, ResourcePath, ResourceTree};
use crate::subscription::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Manages a single WebSocket connection with its observations.
///
/// Observations are owned by the manager, so they are cancelled when the
/// connection ends.
pub struct ConnectionManager {
    id: Uuid,
    tree: Arc<ResourceTree>,

    /// Observed paths (canonical form) to their registration
    observations: HashMap<String, Observation>,

    /// Shared sink for all of this connection's observations
    notification_tx: mpsc::Sender<Notification>,
}

impl ConnectionManager {
    pub fn new(tree: Arc<ResourceTree>, notification_tx: mpsc::Sender<Notification>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree,
            observations: HashMap::new(),
            notification_tx,
        }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(
        mut self,
        mut socket: WebSocket,
        mut notification_rx: mpsc::Receiver<Notification>,
    ) {
        info!(connection = %self.id, "WebSocket connection established");

        loop {
            tokio::select! {
                // Handle incoming client messages
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            let reply = self.handle_client_message(&text);
                            if let Err(e) = send(&mut socket, &reply).await {
                                error!(connection = %self.id, error = %e, "Failed to send reply");
                                break;
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!(connection = %self.id, "WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(connection = %self.id, error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(connection = %self.id, error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Forward notifications from observed resources
                Some(notification) = notification_rx.recv() => {
                    let msg = ServerMessage::from(notification);
                    if let Err(e) = send(&mut socket, &msg).await {
                        error!(connection = %self.id, error = %e, "Failed to send notification");
                        break;
                    }
                }

                else => {
                    break;
                }
            }
        }

        info!(
            connection = %self.id,
            observations = self.observations.len(),
            "WebSocket connection closed"
        );
    }

    /// Apply a client message and build the reply
    pub fn handle_client_message(&mut self, text: &str) -> ServerMessage {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => return ServerMessage::error(format!("invalid message: {}", e)),
        };

        match msg {
            ClientMessage::Subscribe { path } => self.subscribe(&path),
            ClientMessage::Unsubscribe { path } => self.unsubscribe(&path),
        }
    }

    fn subscribe(&mut self, path: &str) -> ServerMessage {
        if let Some(canonical) = canonical(path) {
            if self.observations.contains_key(&canonical) {
                return ServerMessage::Subscribed { path: canonical };
            }
        }

        match self.tree.observe(path, self.notification_tx.clone()) {
            Ok(observation) => {
                let canonical = observation.path().to_string();
                info!(connection = %self.id, path = %canonical, "Client subscribed");
                self.observations.insert(canonical.clone(), observation);
                ServerMessage::Subscribed { path: canonical }
            }
            Err(e) => {
                warn!(connection = %self.id, path = %path, error = %e, "Subscription refused");
                ServerMessage::error(e)
            }
        }
    }

    fn unsubscribe(&mut self, path: &str) -> ServerMessage {
        let canonical = canonical(path).unwrap_or_else(|| path.to_string());
        if self.observations.remove(&canonical).is_some() {
            info!(connection = %self.id, path = %canonical, "Client unsubscribed");
        }
        ServerMessage::Unsubscribed { path: canonical }
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }
}

fn canonical(path: &str) -> Option<String> {
    ResourcePath::parse(path).map(|p| p.canonical())
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
