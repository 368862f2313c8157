//! Session orchestrator
//!
//! Drives one conversational turn end to end: admitted input → token stream
//! → segmenter → audio pipeline, with lifecycle events broadcast on a typed
//! channel. Collaborators are injected at construction; the orchestrator
//! never touches a transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use voice_assistant_config::{SessionSettings, VoiceConfig, VoiceConfigPatch, VoiceManager};
use voice_assistant_core::{
    AssistantEvent, InboundMessage, SessionStats, Turn, TurnMetrics,
};
use voice_assistant_pipeline::{AudioPipeline, PipelineStatus};
use voice_assistant_text::{SegmenterConfig, SentenceSegmenter};

use crate::admission::{AdmissionGate, GateConfig};
use crate::history::ConversationHistory;
use crate::source::{SpeechRecognizer, TokenSource};
use crate::SessionError;

/// Phase of the turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Listening,
    AwaitingFirstToken,
    Streaming,
    Finalizing,
}

/// Session tuning
///
/// Drain and listen budgets are empirically chosen defaults.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub gate: GateConfig,
    pub segmenter: SegmenterConfig,
    /// Maximum retained history entries
    pub history_limit: usize,
    /// Minimum drain budget after the token stream ends
    pub min_drain: Duration,
    /// Additional drain budget per generated token
    pub drain_per_token: Duration,
    /// Interval between drain polls
    pub drain_poll: Duration,
    /// Microphone capture budget for a voice turn
    pub listen_timeout: Duration,
    /// Trailing silence that ends a voice capture
    pub listen_silence: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            segmenter: SegmenterConfig::default(),
            history_limit: 100,
            min_drain: Duration::from_secs(60),
            drain_per_token: Duration::from_millis(300),
            drain_poll: Duration::from_millis(500),
            listen_timeout: Duration::from_secs(15),
            listen_silence: Duration::from_millis(1500),
        }
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            gate: GateConfig {
                dedup_window: Duration::from_millis(settings.dedup_window_ms),
                retention: Duration::from_millis(settings.dedup_retention_ms),
                sweep_interval: Duration::from_millis(settings.dedup_retention_ms / 2),
            },
            segmenter: SegmenterConfig::default(),
            history_limit: settings.history_limit,
            min_drain: Duration::from_secs(settings.min_drain_secs),
            drain_per_token: Duration::from_millis(settings.drain_per_token_ms),
            drain_poll: Duration::from_millis(settings.drain_poll_ms),
            listen_timeout: Duration::from_secs(settings.listen_timeout_secs),
            listen_silence: Duration::from_millis(settings.listen_silence_ms),
        }
    }
}

/// Drives conversational turns and owns the session state
pub struct SessionOrchestrator {
    config: SessionConfig,
    source: Arc<dyn TokenSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
    pipeline: Arc<AudioPipeline>,
    voices: Arc<VoiceManager>,
    gate: Arc<AdmissionGate>,
    history: RwLock<ConversationHistory>,
    phase: SyncMutex<TurnPhase>,
    initialized: AtomicBool,
    sweeper: SyncMutex<Option<watch::Sender<bool>>>,
    event_tx: broadcast::Sender<AssistantEvent>,
}

impl SessionOrchestrator {
    pub fn new(
        source: Arc<dyn TokenSource>,
        recognizer: Arc<dyn SpeechRecognizer>,
        pipeline: Arc<AudioPipeline>,
        voices: Arc<VoiceManager>,
        config: SessionConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let gate = Arc::new(AdmissionGate::new(config.gate.clone()));

        Self {
            history: RwLock::new(ConversationHistory::new(config.history_limit)),
            config,
            source,
            recognizer,
            pipeline,
            voices,
            gate,
            phase: SyncMutex::new(TurnPhase::Idle),
            initialized: AtomicBool::new(false),
            sweeper: SyncMutex::new(None),
            event_tx,
        }
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.event_tx.subscribe()
    }

    /// One-time session initialization; safe to call repeatedly
    pub async fn initialize(&self) -> Result<(), SessionError> {
        let _guard = self.gate.begin_turn().await;
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let voice = self.voices.current();
        self.pipeline.start();
        *self.sweeper.lock() = Some(self.gate.start_sweeper());
        self.initialized.store(true, Ordering::SeqCst);

        tracing::info!(model = %voice.model, voice = %voice.voice, "session initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Current turn phase
    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock()
    }

    /// Snapshot of the retained history
    pub fn history(&self) -> Vec<Turn> {
        self.history.read().turns()
    }

    /// Snapshot of the running session statistics
    pub fn stats(&self) -> SessionStats {
        self.history.read().stats()
    }

    /// Drop history and statistics
    pub fn clear_history(&self) {
        self.history.write().clear();
        tracing::info!("conversation history cleared");
    }

    /// Pipeline view for status endpoints
    pub fn pipeline_status(&self) -> PipelineStatus {
        self.pipeline.status()
    }

    /// Display name derived from the active voice
    pub fn persona(&self) -> String {
        format!("Voice assistant - {}", self.voices.current().voice)
    }

    /// Handle an inbound text request; duplicates are dropped silently
    pub async fn process_text(&self, text: &str) {
        let message = InboundMessage::text(text);
        if !self.gate.admit(&message) {
            return;
        }

        let _turn = self.gate.begin_turn().await;

        if !self.is_initialized() {
            self.emit(AssistantEvent::Error {
                content: SessionError::NotInitialized.to_string(),
            });
            return;
        }

        tracing::info!(preview = %preview(text), "text message received");
        self.history.write().push(Turn::user(text));
        self.emit(AssistantEvent::MessageProcessingStart {
            content: text.to_string(),
        });

        if let Err(e) = self.run_turn(text).await {
            tracing::error!(error = %e, "turn failed");
            self.emit(AssistantEvent::Error {
                content: e.to_string(),
            });
        }
        self.set_phase(TurnPhase::Idle);
    }

    /// Voice turn: capture, transcribe, then run the text path
    pub async fn process_voice(&self) {
        if !self.is_initialized() {
            self.emit(AssistantEvent::Error {
                content: "speech recognition is not available".to_string(),
            });
            return;
        }

        let message = InboundMessage::voice();
        if !self.gate.admit(&message) {
            return;
        }

        self.set_phase(TurnPhase::Listening);
        self.emit(AssistantEvent::ListeningStart);
        tracing::info!("listening for voice input");

        let heard = self
            .recognizer
            .listen(self.config.listen_timeout, self.config.listen_silence)
            .await;

        self.emit(AssistantEvent::ListeningEnd);

        match heard {
            Ok(Some(transcript)) if !transcript.trim().is_empty() => {
                self.emit(AssistantEvent::Transcription {
                    content: transcript.clone(),
                });
                self.process_text(&transcript).await;
            }
            Ok(_) => {
                // Silence is not an error; the turn just never starts
                tracing::info!("no speech detected");
            }
            Err(e) => {
                tracing::error!(error = %e, "speech recognition failed");
                self.emit(AssistantEvent::Error {
                    content: format!("microphone error: {e}"),
                });
            }
        }
        self.set_phase(TurnPhase::Idle);
    }

    /// Apply a voice change through the configuration collaborator
    pub async fn update_voice(&self, patch: VoiceConfigPatch) -> Result<VoiceConfig, SessionError> {
        let updated = self.voices.apply(patch)?;
        self.pipeline.reconfigure(updated.clone());
        Ok(updated)
    }

    /// Stop the pipeline workers and the admission sweeper
    pub async fn shutdown(&self) {
        self.pipeline.stop().await;
        if let Some(shutdown) = self.sweeper.lock().take() {
            let _ = shutdown.send(true);
        }
        tracing::info!("session orchestrator stopped");
    }

    async fn run_turn(&self, input: &str) -> Result<(), SessionError> {
        let turn_started = Instant::now();
        self.set_phase(TurnPhase::AwaitingFirstToken);
        self.pipeline.start();

        let history_snapshot = self.history.read().turns();
        let mut stream = self
            .source
            .stream(input, &history_snapshot)
            .await
            .map_err(|e| SessionError::Source(e.to_string()))?;

        let mut segmenter = SentenceSegmenter::new(self.config.segmenter.clone());
        let mut response = String::new();
        let mut token_count: usize = 0;
        let mut ttft: Option<f64> = None;
        let mut first_audio: Option<f64> = None;

        while let Some(item) = stream.next().await {
            let token = item.map_err(|e| SessionError::Source(e.to_string()))?;

            if ttft.is_none() {
                let elapsed = turn_started.elapsed().as_secs_f64();
                ttft = Some(elapsed);
                self.set_phase(TurnPhase::Streaming);
                self.emit(AssistantEvent::FirstToken {
                    content: token.clone(),
                    ttft: elapsed,
                });
            }

            self.emit(AssistantEvent::LlmToken {
                content: token.clone(),
            });
            response.push_str(&token);
            token_count += 1;

            // A completed sentence goes straight to the pipeline so audio
            // starts before the rest of the response exists.
            if let Some(unit) = segmenter.feed(&token) {
                if first_audio.is_none() {
                    first_audio = Some(turn_started.elapsed().as_secs_f64());
                }
                self.pipeline.submit(unit).await?;
            }
        }

        if let Some(unit) = segmenter.flush() {
            if first_audio.is_none() {
                first_audio = Some(turn_started.elapsed().as_secs_f64());
            }
            self.pipeline.submit(unit).await?;
        }

        self.set_phase(TurnPhase::Finalizing);
        self.drain_pipeline(token_count).await;

        let total_time = turn_started.elapsed().as_secs_f64();
        let pipeline_stats = self.pipeline.stats();
        self.pipeline.record_turn();

        let metrics = TurnMetrics {
            total_time,
            token_count,
            ttft: ttft.unwrap_or(0.0),
            first_audio_time: first_audio.unwrap_or(0.0),
            tokens_per_second: token_count as f64 / total_time.max(0.001),
            pipeline_efficiency: pipeline_stats.overlap_efficiency,
        };

        {
            let mut history = self.history.write();
            history.push(Turn::assistant(&response, token_count));
            history.record_turn_metrics(&metrics);
        }

        self.emit(AssistantEvent::LlmComplete {
            content: response,
            metrics,
        });
        tracing::info!(
            token_count,
            total_time_s = total_time,
            tokens_per_second = metrics.tokens_per_second,
            efficiency = metrics.pipeline_efficiency,
            "turn complete"
        );
        self.set_phase(TurnPhase::Idle);
        Ok(())
    }

    /// Wait for the pipeline to empty, bounded by a size-proportional budget
    async fn drain_pipeline(&self, token_count: usize) {
        let budget = self
            .config
            .min_drain
            .max(self.config.drain_per_token * token_count as u32);
        let deadline = Instant::now() + budget;

        while Instant::now() < deadline {
            if self.pipeline.is_idle() {
                return;
            }
            tokio::time::sleep(self.config.drain_poll).await;
        }
        tracing::warn!(budget_s = budget.as_secs_f64(), "pipeline drain timed out");
    }

    fn set_phase(&self, phase: TurnPhase) {
        *self.phase.lock() = phase;
    }

    fn emit(&self, event: AssistantEvent) {
        // A send error only means no subscriber is connected right now
        let _ = self.event_tx.send(event);
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(50).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}
