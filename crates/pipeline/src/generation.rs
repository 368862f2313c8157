//! Generation stage worker
//!
//! Single consumer of the text unit queue. Retries synthesis with linear
//! backoff; a unit that exhausts its retries is dropped so later units keep
//! flowing.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::timeout;

use voice_assistant_config::VoiceConfig;
use voice_assistant_core::{AudioUnit, TextUnit};

use crate::controller::{Job, PipelineConfig, Playable};
use crate::stats::StatsRecorder;
use crate::traits::SpeechSynthesizer;

pub(crate) struct GenerationWorker {
    pub(crate) config: PipelineConfig,
    pub(crate) synthesizer: Arc<dyn SpeechSynthesizer>,
    pub(crate) voice: Arc<RwLock<VoiceConfig>>,
    pub(crate) stats: Arc<StatsRecorder>,
}

impl GenerationWorker {
    pub(crate) async fn run(self, mut jobs: mpsc::Receiver<Job>, audio_tx: mpsc::Sender<Playable>) {
        tracing::debug!("generation worker started");

        loop {
            let job = match timeout(self.config.idle_log_interval, jobs.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!("generation worker idle");
                    continue;
                }
            };

            match job {
                Job::Unit(unit) => {
                    if let Some(audio) = self.generate(&unit).await {
                        // Awaiting here is the backpressure that bounds
                        // how far generation can run ahead of playback.
                        if audio_tx.send(Playable::Unit(audio)).await.is_err() {
                            tracing::warn!("playback queue closed, generation worker exiting");
                            break;
                        }
                    }
                }
                Job::Stop => {
                    let _ = audio_tx.send(Playable::Stop).await;
                    break;
                }
            }
        }

        tracing::debug!("generation worker stopped");
    }

    /// Synthesize one unit, retrying with linearly increasing backoff
    async fn generate(&self, unit: &TextUnit) -> Option<AudioUnit> {
        let started = Instant::now();
        let attempts = self.config.max_retries + 1;

        for attempt in 1..=attempts {
            let voice = self.voice.read().clone();

            match self.synthesizer.synthesize(&unit.text, &voice).await {
                Ok(audio) => {
                    let took = started.elapsed();
                    self.stats.record_generated(took);
                    tracing::debug!(
                        sequence_id = unit.sequence_id,
                        attempt,
                        took_ms = took.as_millis() as u64,
                        "unit synthesized"
                    );
                    return Some(AudioUnit {
                        sequence_id: unit.sequence_id,
                        audio,
                        generation_duration: took,
                        generated: true,
                        attempt_count: attempt,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        sequence_id = unit.sequence_id,
                        attempt,
                        error = %e,
                        "synthesis attempt failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    }
                }
            }
        }

        self.stats.record_dropped();
        tracing::error!(
            sequence_id = unit.sequence_id,
            attempts,
            "unit dropped after retry exhaustion"
        );
        None
    }
}
