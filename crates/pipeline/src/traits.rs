//! Collaborator interfaces for synthesis and playback
//!
//! The pipeline depends only on these traits; one implementation exists per
//! backend. The in-process backends here serve demos and tests.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;

use voice_assistant_config::VoiceConfig;

use crate::PipelineError;

/// Opaque audio synthesis backend
///
/// Implementations must be safe to retry with identical inputs.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice into an encoded audio buffer
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, PipelineError>;
}

/// Audio output backend
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play the buffer, returning once the audio finished (or failed)
    async fn play(&self, audio: &[u8]) -> Result<(), PipelineError>;
}

/// In-process synthesizer producing a short sine burst per unit
///
/// Audio length scales with text length and the configured speaking rate,
/// so pipeline timing behaves like a real backend without loading one.
pub struct ToneSynthesizer {
    sample_rate: u32,
    ms_per_char: u64,
}

impl ToneSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: 22_050,
            ms_per_char: 50,
        }
    }

    /// Override the per-character pacing (tests use a few ms)
    pub fn with_pacing(sample_rate: u32, ms_per_char: u64) -> Self {
        Self {
            sample_rate,
            ms_per_char,
        }
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, PipelineError> {
        let chars = text.chars().count().max(1) as u64;
        let duration_ms = ((chars * self.ms_per_char) as f32 / voice.speed.max(0.25)) as u64;

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        let total_samples = self.sample_rate as u64 * duration_ms / 1000;
        let amplitude = voice.volume.clamp(0.0, 1.0) * i16::MAX as f32;
        for n in 0..total_samples {
            let t = n as f32 / self.sample_rate as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * amplitude;
            writer
                .write_sample(sample as i16)
                .map_err(|e| PipelineError::Synthesis(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        Ok(cursor.into_inner())
    }
}

/// Playback backend that paces itself on the WAV duration
///
/// No audio device involved: it sleeps for the clip's length, which is what
/// a blocking device call looks like to the pipeline.
pub struct PacedPlayer {
    time_scale: f64,
}

impl PacedPlayer {
    pub fn new() -> Self {
        Self { time_scale: 1.0 }
    }

    /// Scale sleep time (tests pass a fraction to speed things up)
    pub fn with_time_scale(time_scale: f64) -> Self {
        Self { time_scale }
    }
}

impl Default for PacedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioPlayer for PacedPlayer {
    async fn play(&self, audio: &[u8]) -> Result<(), PipelineError> {
        let reader = hound::WavReader::new(Cursor::new(audio))
            .map_err(|e| PipelineError::Playback(format!("invalid audio buffer: {e}")))?;

        let spec = reader.spec();
        let seconds = reader.duration() as f64 / spec.sample_rate as f64;
        tokio::time::sleep(Duration::from_secs_f64(seconds * self.time_scale)).await;
        Ok(())
    }
}
