//! Event relay
//!
//! Owns the set of live client connections and fans events out to them.
//! A send failure evicts only the failing connection; the broadcast keeps
//! going for everyone else.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use voice_assistant_core::AssistantEvent;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

struct Connection {
    tx: mpsc::UnboundedSender<Message>,
    state: ConnectionState,
}

/// Fan-out hub for all live client connections
#[derive(Default)]
pub struct EventRelay {
    connections: DashMap<Uuid, Connection>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound channel; returns its identity
    pub fn register(&self, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            Connection {
                tx,
                state: ConnectionState::Connecting,
            },
        );
        id
    }

    /// Mark a connection open once its handshake finished
    pub fn mark_open(&self, id: &Uuid) {
        if let Some(mut conn) = self.connections.get_mut(id) {
            conn.state = ConnectionState::Open;
        }
    }

    /// Remove a connection (explicit close or receive-loop exit)
    pub fn remove(&self, id: &Uuid) {
        if self.connections.remove(id).is_some() {
            tracing::debug!(connection = %id, "connection removed");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send one event to one connection
    pub fn send_to(&self, id: &Uuid, event: &AssistantEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(payload) => self.send_raw(id, Message::Text(payload)),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event");
                false
            }
        }
    }

    /// Broadcast an event to every live connection
    ///
    /// Serialized once; a failing connection is dropped from the set
    /// without aborting the rest of the fan-out.
    pub fn broadcast(&self, event: &AssistantEvent) {
        if self.connections.is_empty() {
            return;
        }

        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event");
                return;
            }
        };

        let ids: Vec<Uuid> = self.connections.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.send_raw(&id, Message::Text(payload.clone()));
        }
        metrics::counter!("relay_events_broadcast_total").increment(1);
    }

    fn send_raw(&self, id: &Uuid, message: Message) -> bool {
        let failed = match self.connections.get(id) {
            Some(conn) => match conn.state {
                ConnectionState::Connecting | ConnectionState::Open => conn.tx.send(message).is_err(),
                ConnectionState::Closing | ConnectionState::Closed => return false,
            },
            None => return false,
        };

        if failed {
            // Holding no map reference here, so the removal cannot deadlock
            self.connections.remove(id);
            tracing::warn!(connection = %id, "connection dropped on send failure");
            return false;
        }
        true
    }

    /// Close every connection and clear the set
    pub fn shutdown(&self) {
        let ids: Vec<Uuid> = self.connections.iter().map(|entry| *entry.key()).collect();
        for id in &ids {
            if let Some(mut conn) = self.connections.get_mut(id) {
                conn.state = ConnectionState::Closing;
                let _ = conn.tx.send(Message::Close(None));
            }
        }
        self.connections.clear();
        tracing::info!(closed = ids.len(), "event relay shut down");
    }
}
