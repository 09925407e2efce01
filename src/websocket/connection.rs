use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use super::events::{ClientEvent, ServerEvent};
use crate::database::DbPool;
use crate::services::presence;

/// Push hub with two lanes: a per-user direct registry for conversation
/// events (message bodies and read receipts go only to the two
/// participants) and a shared broadcast channel for advisory events
/// like presence changes.
pub struct ConnectionManager {
    broadcast_tx: broadcast::Sender<ServerEvent>,
    direct_txs: RwLock<HashMap<String, Vec<(String, mpsc::UnboundedSender<ServerEvent>)>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1000);
        Self {
            broadcast_tx,
            direct_txs: RwLock::new(HashMap::new()),
        }
    }

    /// A user may hold several sockets (tabs); each gets its own entry.
    async fn register(
        &self,
        user_id: &str,
    ) -> (
        String,
        mpsc::UnboundedSender<ServerEvent>,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let connection_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut direct_txs = self.direct_txs.write().await;
        direct_txs
            .entry(user_id.to_string())
            .or_default()
            .push((connection_id.clone(), tx.clone()));

        (connection_id, tx, rx)
    }

    async fn unregister(&self, user_id: &str, connection_id: &str) {
        let mut direct_txs = self.direct_txs.write().await;
        if let Some(connections) = direct_txs.get_mut(user_id) {
            connections.retain(|(id, _)| id != connection_id);
            if connections.is_empty() {
                direct_txs.remove(user_id);
            }
        }
    }

    /// Delivers to every live socket of one user; absent users are a no-op.
    pub async fn send_to_user(&self, user_id: &str, event: ServerEvent) {
        let direct_txs = self.direct_txs.read().await;
        if let Some(connections) = direct_txs.get(user_id) {
            for (_, tx) in connections {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Routes a conversation event to exactly its two participants.
    pub async fn notify_pair(&self, user_a: &str, user_b: &str, event: ServerEvent) {
        self.send_to_user(user_a, event.clone()).await;
        self.send_to_user(user_b, event).await;
    }

    async fn session_started(&self, db: &DbPool, user_id: &str) {
        // Presence is advisory; a failed write is logged and dropped.
        match presence::set_online(db, user_id, true).await {
            Ok(true) => {
                let _ = self.broadcast_tx.send(ServerEvent::PresenceChanged {
                    user_id: user_id.to_string(),
                    is_online: true,
                });
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to mark {} online: {}", user_id, e),
        }
    }

    async fn session_ended(&self, db: &DbPool, user_id: &str) {
        match presence::set_online(db, user_id, false).await {
            Ok(true) => {
                let _ = self.broadcast_tx.send(ServerEvent::PresenceChanged {
                    user_id: user_id.to_string(),
                    is_online: false,
                });
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to mark {} offline: {}", user_id, e),
        }
    }

    pub async fn handle_connection(&self, socket: WebSocket, user_id: String, db: DbPool) {
        let (mut sender, mut receiver) = socket.split();
        let (connection_id, direct_tx, mut direct_rx) = self.register(&user_id).await;
        let mut rx = self.broadcast_tx.subscribe();

        let _ = direct_tx.send(ServerEvent::Connected {
            user_id: user_id.clone(),
        });

        let send_task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    direct = direct_rx.recv() => match direct {
                        Some(event) => event,
                        None => break,
                    },
                    shared = rx.recv() => match shared {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                if let Ok(json) = serde_json::to_string(&event)
                    && sender.send(Message::Text(json)).await.is_err()
                {
                    break;
                }
            }
        });

        let pong_tx = direct_tx.clone();
        let heartbeat_db = db.clone();
        let heartbeat_user = user_id.clone();

        let recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                if let Message::Text(text) = msg
                    && let Ok(client_event) = serde_json::from_str::<ClientEvent>(&text)
                    && let ClientEvent::Heartbeat = client_event
                {
                    if let Err(e) =
                        presence::set_online(&heartbeat_db, &heartbeat_user, true).await
                    {
                        tracing::debug!("Dropped heartbeat for {}: {}", heartbeat_user, e);
                    }
                    let _ = pong_tx.send(ServerEvent::Pong);
                }
            }
        });

        self.session_started(&db, &user_id).await;

        tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
        }

        self.session_ended(&db, &user_id).await;
        self.unregister(&user_id, &connection_id).await;
    }

    pub async fn broadcast(&self, event: ServerEvent) {
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
