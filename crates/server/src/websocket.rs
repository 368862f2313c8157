//! WebSocket endpoint
//!
//! One receive loop per connection parses inbound control messages and
//! dispatches them by kind; a writer task drains the connection's outbound
//! queue. The first connection drives one-time session initialization.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use voice_assistant_config::VoiceConfigPatch;
use voice_assistant_core::{AssistantEvent, ClientMessage};

use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = state.relay.register(tx);
    tracing::info!(connection = %id, "client connected");

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    greet(&state, &id).await;
    state.relay.mark_open(&id);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(raw)) => dispatch(&state, &id, &raw).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "receive failed");
                break;
            }
        }
    }

    state.relay.remove(&id);
    writer.abort();
    tracing::info!(connection = %id, "client disconnected");
}

/// First contact: initialize the session once, or confirm readiness
async fn greet(state: &AppState, id: &Uuid) {
    if state.orchestrator.is_initialized() {
        state.relay.send_to(
            id,
            &AssistantEvent::Status {
                content: "Connection established".to_string(),
                persona: Some(state.orchestrator.persona()),
            },
        );
        return;
    }

    state.relay.send_to(
        id,
        &AssistantEvent::Status {
            content: "Initializing...".to_string(),
            persona: None,
        },
    );

    match state.orchestrator.initialize().await {
        Ok(()) => state.relay.broadcast(&AssistantEvent::Status {
            content: "Ready".to_string(),
            persona: Some(state.orchestrator.persona()),
        }),
        Err(e) => {
            tracing::error!(error = %e, "session initialization failed");
            state.relay.send_to(
                id,
                &AssistantEvent::Error {
                    content: format!("initialization failed: {e}"),
                },
            );
        }
    }
}

/// Route one inbound message by kind
///
/// Turn requests run in their own tasks so this connection keeps answering
/// pings while a turn is in flight; concurrent requests queue on the
/// orchestrator's turn guard.
async fn dispatch(state: &AppState, id: &Uuid, raw: &str) {
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(connection = %id, error = %e, "unrecognized client message");
            return;
        }
    };

    match message {
        ClientMessage::TextMessage { text } => {
            if text.trim().is_empty() {
                tracing::warn!(connection = %id, "empty text message ignored");
                return;
            }
            let orchestrator = state.orchestrator.clone();
            tokio::spawn(async move { orchestrator.process_text(&text).await });
        }
        ClientMessage::VoiceInput => {
            let orchestrator = state.orchestrator.clone();
            tokio::spawn(async move { orchestrator.process_voice().await });
        }
        ClientMessage::ConfigUpdate { config } => {
            let patch: VoiceConfigPatch = match serde_json::from_value(config) {
                Ok(patch) => patch,
                Err(e) => {
                    state.relay.broadcast(&AssistantEvent::ConfigUpdated {
                        success: false,
                        message: format!("invalid config payload: {e}"),
                    });
                    return;
                }
            };
            match state.orchestrator.update_voice(patch).await {
                Ok(updated) => state.relay.broadcast(&AssistantEvent::ConfigUpdated {
                    success: true,
                    message: format!("voice set to {}", updated.voice),
                }),
                Err(e) => state.relay.broadcast(&AssistantEvent::ConfigUpdated {
                    success: false,
                    message: e.to_string(),
                }),
            }
        }
        ClientMessage::Ping => state.relay.broadcast(&AssistantEvent::Pong),
    }
}
