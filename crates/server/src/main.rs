//! Voice assistant server entry point

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use voice_assistant_config::{load_settings, Settings, VoiceManager};
use voice_assistant_pipeline::{AudioPipeline, PacedPlayer, PipelineConfig, ToneSynthesizer};
use voice_assistant_server::{create_router, init_metrics, AppState, EventRelay};
use voice_assistant_session::{
    EchoTokenSource, SessionConfig, SessionOrchestrator, SilentRecognizer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings(std::env::var("VOICE_ASSISTANT_ENV").ok().as_deref())?;
    init_tracing(&settings);

    tracing::info!("starting voice assistant server v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if settings.observability.metrics_enabled {
        init_metrics()
    } else {
        None
    };

    let voices = Arc::new(VoiceManager::with_persistence(&settings.voice_config_path));

    // The binary wires the in-process collaborator backends; real language
    // model, synthesis and microphone backends implement the same traits.
    let pipeline = Arc::new(AudioPipeline::new(
        PipelineConfig::from(&settings.pipeline),
        Arc::new(ToneSynthesizer::new()),
        Arc::new(PacedPlayer::new()),
        voices.current(),
    ));
    let orchestrator = Arc::new(SessionOrchestrator::new(
        Arc::new(EchoTokenSource::new()),
        Arc::new(SilentRecognizer),
        pipeline,
        voices.clone(),
        SessionConfig::from(&settings.session),
    ));
    let relay = Arc::new(EventRelay::new());

    let state = AppState::new(
        settings.clone(),
        orchestrator,
        relay,
        voices,
        metrics_handle,
    );
    state.start_event_forwarder();

    let app = create_router(state.clone());

    let host: IpAddr = settings.server.host.parse()?;
    let addr = SocketAddr::from((host, settings.server.port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.orchestrator.shutdown().await;
    state.relay.shutdown();
    tracing::info!("server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Initialize tracing from the observability settings
fn init_tracing(settings: &Settings) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.observability.log_level));

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
