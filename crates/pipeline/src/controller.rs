//! Pipeline controller
//!
//! Owns the two bounded queues and their stage workers. The pipeline runs in
//! its own explicitly spawned tasks with a documented start/stop lifecycle;
//! shutdown travels through the queues as a sentinel so in-flight work
//! drains before the workers exit.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;

use voice_assistant_config::{PipelineSettings, VoiceConfig};
use voice_assistant_core::{AudioUnit, TextUnit};

use crate::generation::GenerationWorker;
use crate::playback::PlaybackWorker;
use crate::stats::{PipelineStats, StatsRecorder};
use crate::traits::{AudioPlayer, SpeechSynthesizer};
use crate::PipelineError;

/// Generation queue message; `Stop` is the drain sentinel
#[derive(Debug)]
pub(crate) enum Job {
    Unit(TextUnit),
    Stop,
}

/// Playback queue message; `Stop` is forwarded once by the generation stage
#[derive(Debug)]
pub(crate) enum Playable {
    Unit(AudioUnit),
    Stop,
}

/// Pipeline tuning
///
/// Every timing value here is an empirically chosen default, not an
/// invariant; callers override them freely.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of the text unit queue feeding generation
    pub text_queue_capacity: usize,
    /// Capacity of the audio unit queue feeding playback
    pub audio_queue_capacity: usize,
    /// Synthesis retries after the first failed attempt
    pub max_retries: u32,
    /// Base retry backoff, scaled linearly per attempt
    pub retry_backoff: Duration,
    /// Idle heartbeat interval for the stage workers
    pub idle_log_interval: Duration,
    /// Force-stop budget for a single playback
    pub playback_timeout: Duration,
    /// Warm-up phrase; empty disables warm-up synthesis
    pub warm_up_text: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_queue_capacity: 50,
            audio_queue_capacity: 10,
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
            idle_log_interval: Duration::from_secs(30),
            playback_timeout: Duration::from_secs(30),
            warm_up_text: "Ready.".to_string(),
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            text_queue_capacity: settings.text_queue_capacity,
            audio_queue_capacity: settings.audio_queue_capacity,
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
            idle_log_interval: Duration::from_secs(settings.idle_log_secs),
            playback_timeout: Duration::from_secs(settings.playback_timeout_secs),
            warm_up_text: settings.warm_up_text.clone(),
        }
    }
}

/// Point-in-time view of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub active: bool,
    pub generation_queue_depth: usize,
    pub playback_queue_depth: usize,
    pub in_flight: u64,
    pub warmed_up: bool,
    pub stats: PipelineStats,
}

/// Owns the stage workers and their queues
pub struct AudioPipeline {
    config: PipelineConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    voice: Arc<RwLock<VoiceConfig>>,
    stats: Arc<StatsRecorder>,
    job_tx: Mutex<Option<mpsc::Sender<Job>>>,
    /// Observer clone of the playback sender, kept for depth reporting
    audio_tx: Mutex<Option<mpsc::Sender<Playable>>>,
    warmed_up: Arc<std::sync::atomic::AtomicBool>,
}

impl AudioPipeline {
    /// Create a pipeline; workers start on [`AudioPipeline::start`]
    pub fn new(
        config: PipelineConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        voice: VoiceConfig,
    ) -> Self {
        Self {
            config,
            synthesizer,
            player,
            voice: Arc::new(RwLock::new(voice)),
            stats: Arc::new(StatsRecorder::default()),
            job_tx: Mutex::new(None),
            audio_tx: Mutex::new(None),
            warmed_up: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Spawn both stage workers; calling on an active pipeline is a no-op
    pub fn start(&self) {
        let mut job_tx = self.job_tx.lock();
        if job_tx.is_some() {
            tracing::debug!("pipeline already active");
            return;
        }

        let (tx, job_rx) = mpsc::channel(self.config.text_queue_capacity);
        let (audio_tx, audio_rx) = mpsc::channel(self.config.audio_queue_capacity);
        *job_tx = Some(tx);
        *self.audio_tx.lock() = Some(audio_tx.clone());

        let generation = GenerationWorker {
            config: self.config.clone(),
            synthesizer: self.synthesizer.clone(),
            voice: self.voice.clone(),
            stats: self.stats.clone(),
        };
        let playback = PlaybackWorker {
            config: self.config.clone(),
            player: self.player.clone(),
            stats: self.stats.clone(),
        };

        tokio::spawn(generation.run(job_rx, audio_tx));
        tokio::spawn(playback.run(audio_rx));

        self.spawn_warm_up();
        tracing::info!("pipeline workers started");
    }

    /// Signal both workers to drain and exit
    ///
    /// In-flight units complete; no new work is accepted once the sentinel
    /// is queued.
    pub async fn stop(&self) {
        let tx = self.job_tx.lock().take();
        let Some(tx) = tx else {
            return;
        };

        if tx.send(Job::Stop).await.is_err() {
            tracing::debug!("generation worker already gone");
        }
        tracing::info!("pipeline stop signalled");
    }

    /// True between `start()` and `stop()`
    pub fn is_active(&self) -> bool {
        self.job_tx.lock().is_some()
    }

    /// Submit a text unit for synthesis; awaits while the queue is full
    pub async fn submit(&self, unit: TextUnit) -> Result<(), PipelineError> {
        let tx = self.job_tx.lock().clone();
        let Some(tx) = tx else {
            return Err(PipelineError::NotStarted);
        };

        tx.send(Job::Unit(unit))
            .await
            .map_err(|_| PipelineError::ChannelClosed)?;
        self.stats.record_submitted();
        Ok(())
    }

    /// Queue depths, activity and cumulative statistics
    pub fn status(&self) -> PipelineStatus {
        let stats = self.stats.snapshot();
        PipelineStatus {
            active: self.is_active(),
            generation_queue_depth: Self::depth(&*self.job_tx.lock()),
            playback_queue_depth: Self::depth(&*self.audio_tx.lock()),
            in_flight: stats.in_flight(),
            warmed_up: self.warmed_up.load(std::sync::atomic::Ordering::Relaxed),
            stats,
        }
    }

    /// Both queues empty and every submitted unit fully disposed of
    pub fn is_idle(&self) -> bool {
        Self::depth(&*self.job_tx.lock()) == 0
            && Self::depth(&*self.audio_tx.lock()) == 0
            && self.stats.snapshot().in_flight() == 0
    }

    fn depth<T>(tx: &Option<mpsc::Sender<T>>) -> usize {
        tx.as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    /// Cumulative statistics snapshot
    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// Count a drained turn
    pub fn record_turn(&self) {
        self.stats.record_turn();
    }

    /// Snapshot of the voice used for future generations
    pub fn voice(&self) -> VoiceConfig {
        self.voice.read().clone()
    }

    /// Swap the voice used for future generations
    ///
    /// In-flight units keep the configuration they were generated with; a
    /// warm-up synthesis runs asynchronously against the new voice.
    pub fn reconfigure(&self, new_voice: VoiceConfig) {
        tracing::info!(model = %new_voice.model, voice = %new_voice.voice, "pipeline voice reconfigured");
        *self.voice.write() = new_voice;
        self.warmed_up
            .store(false, std::sync::atomic::Ordering::Relaxed);
        self.spawn_warm_up();
    }

    /// Fire-and-forget synthesis to hide first-call latency on a cold backend
    fn spawn_warm_up(&self) {
        if self.config.warm_up_text.is_empty()
            || self.warmed_up.load(std::sync::atomic::Ordering::Relaxed)
        {
            return;
        }

        let synthesizer = self.synthesizer.clone();
        let voice = self.voice.read().clone();
        let warmed_up = self.warmed_up.clone();
        let text = self.config.warm_up_text.clone();

        tokio::spawn(async move {
            match synthesizer.synthesize(&text, &voice).await {
                Ok(_) => {
                    warmed_up.store(true, std::sync::atomic::Ordering::Relaxed);
                    tracing::debug!("synthesis backend warmed up");
                }
                Err(e) => tracing::warn!(error = %e, "warm-up synthesis failed"),
            }
        });
    }
}
