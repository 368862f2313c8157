//! HTTP endpoints
//!
//! Status and history surface next to the WebSocket route.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.settings.server.timeout_seconds);
    let cors_enabled = state.settings.server.cors_enabled;

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .route("/api/status", get(status))
        .route("/api/history", get(history).delete(clear_history))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout));

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "initialized": state.orchestrator.is_initialized(),
        "connections": state.relay.connection_count(),
    }))
}

/// Prometheus scrape endpoint
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Turn phase, pipeline view and connection count
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "phase": state.orchestrator.phase(),
        "pipeline": state.orchestrator.pipeline_status(),
        "connections": state.relay.connection_count(),
        "voice": state.voices.current(),
    }))
}

/// Conversation history with running statistics
async fn history(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "history": state.orchestrator.history(),
        "stats": state.orchestrator.stats(),
    }))
}

/// Drop history and statistics
async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.clear_history();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use voice_assistant_config::{Settings, VoiceConfig, VoiceManager};
    use voice_assistant_pipeline::{
        AudioPipeline, PacedPlayer, PipelineConfig, ToneSynthesizer,
    };
    use voice_assistant_session::{
        EchoTokenSource, SessionConfig, SessionOrchestrator, SilentRecognizer,
    };

    use crate::relay::EventRelay;

    fn test_state() -> AppState {
        let voices = Arc::new(VoiceManager::new(VoiceConfig::default()));
        let pipeline = Arc::new(AudioPipeline::new(
            PipelineConfig::default(),
            Arc::new(ToneSynthesizer::new()),
            Arc::new(PacedPlayer::new()),
            voices.current(),
        ));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            Arc::new(EchoTokenSource::new()),
            Arc::new(SilentRecognizer),
            pipeline,
            voices.clone(),
            SessionConfig::default(),
        ));

        AppState::new(
            Settings::default(),
            orchestrator,
            Arc::new(EventRelay::new()),
            voices,
            None,
        )
    }

    #[tokio::test]
    async fn test_router_creation() {
        let _ = create_router(test_state());
    }
}
