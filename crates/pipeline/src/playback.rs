//! Playback stage worker
//!
//! Single consumer of the audio unit queue. Each unit plays to completion
//! before the next dequeue, which is what guarantees in-order,
//! non-overlapping audible output.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::controller::{PipelineConfig, Playable};
use crate::stats::StatsRecorder;
use crate::traits::AudioPlayer;

pub(crate) struct PlaybackWorker {
    pub(crate) config: PipelineConfig,
    pub(crate) player: Arc<dyn AudioPlayer>,
    pub(crate) stats: Arc<StatsRecorder>,
}

impl PlaybackWorker {
    pub(crate) async fn run(self, mut playables: mpsc::Receiver<Playable>) {
        tracing::debug!("playback worker started");

        loop {
            let playable = match timeout(self.config.idle_log_interval, playables.recv()).await {
                Ok(Some(playable)) => playable,
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!("playback worker idle");
                    continue;
                }
            };

            match playable {
                Playable::Unit(unit) => {
                    tracing::debug!(sequence_id = unit.sequence_id, "playing unit");
                    let started = Instant::now();

                    match timeout(self.config.playback_timeout, self.player.play(&unit.audio)).await
                    {
                        Ok(Ok(())) => {
                            let took = started.elapsed();
                            self.stats.record_played(took);
                            tracing::debug!(
                                sequence_id = unit.sequence_id,
                                took_ms = took.as_millis() as u64,
                                "unit played"
                            );
                        }
                        Ok(Err(e)) => {
                            self.stats.record_abandoned();
                            tracing::error!(
                                sequence_id = unit.sequence_id,
                                error = %e,
                                "playback failed, abandoning unit"
                            );
                        }
                        Err(_) => {
                            self.stats.record_abandoned();
                            tracing::error!(
                                sequence_id = unit.sequence_id,
                                budget_s = self.config.playback_timeout.as_secs_f64(),
                                "playback never signalled completion, force-stopped"
                            );
                        }
                    }
                }
                Playable::Stop => break,
            }
        }

        tracing::debug!("playback worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    use voice_assistant_core::AudioUnit;

    use crate::PipelineError;

    struct RecordingPlayer {
        played: Mutex<Vec<u64>>,
        fail_on: Option<u64>,
    }

    #[async_trait]
    impl AudioPlayer for RecordingPlayer {
        async fn play(&self, audio: &[u8]) -> Result<(), PipelineError> {
            let sequence_id = u64::from_le_bytes(audio.try_into().unwrap());
            if self.fail_on == Some(sequence_id) {
                return Err(PipelineError::Playback("device lost".to_string()));
            }
            self.played.lock().push(sequence_id);
            Ok(())
        }
    }

    fn unit(sequence_id: u64) -> AudioUnit {
        AudioUnit {
            sequence_id,
            audio: sequence_id.to_le_bytes().to_vec(),
            generation_duration: Duration::from_millis(1),
            generated: true,
            attempt_count: 1,
        }
    }

    #[tokio::test]
    async fn test_failed_unit_does_not_stop_later_units() {
        let player = Arc::new(RecordingPlayer {
            played: Mutex::new(Vec::new()),
            fail_on: Some(2),
        });
        let stats = Arc::new(StatsRecorder::default());
        let worker = PlaybackWorker {
            config: PipelineConfig::default(),
            player: player.clone(),
            stats: stats.clone(),
        };

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(worker.run(rx));

        for id in 1..=3 {
            tx.send(Playable::Unit(unit(id))).await.unwrap();
        }
        tx.send(Playable::Stop).await.unwrap();
        handle.await.unwrap();

        assert_eq!(*player.played.lock(), vec![1, 3]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.units_played, 2);
        assert_eq!(snapshot.units_abandoned, 1);
    }
}
