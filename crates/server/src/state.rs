//! Application state
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::broadcast::error::RecvError;

use voice_assistant_config::{Settings, VoiceManager};
use voice_assistant_session::SessionOrchestrator;

use crate::relay::EventRelay;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub settings: Arc<Settings>,
    /// Session orchestrator
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Event relay
    pub relay: Arc<EventRelay>,
    /// Voice configuration manager
    pub voices: Arc<VoiceManager>,
    /// Prometheus scrape handle (when metrics are enabled)
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        orchestrator: Arc<SessionOrchestrator>,
        relay: Arc<EventRelay>,
        voices: Arc<VoiceManager>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            orchestrator,
            relay,
            voices,
            metrics,
        }
    }

    /// Forward orchestrator events to every connected client
    ///
    /// The orchestrator broadcasts on a typed channel and never sees the
    /// transport; this task is the only bridge between the two.
    pub fn start_event_forwarder(&self) {
        let mut events = self.orchestrator.subscribe();
        let relay = self.relay.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => relay.broadcast(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event forwarder lagged behind")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}
