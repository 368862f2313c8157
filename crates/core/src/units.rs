//! Units flowing through the streaming response pipeline
//!
//! A turn's response is cut into ordered, speakable fragments: [`TextUnit`]s
//! before synthesis and [`AudioUnit`]s after. Sequence ids are strictly
//! increasing within a turn, and because each pipeline queue has a single
//! consumer, FIFO order alone carries that order through to audible output.

use std::time::{Duration, Instant};

/// A speakable fragment of a response, emitted by the sentence segmenter
#[derive(Debug, Clone)]
pub struct TextUnit {
    /// Monotonic position within the turn (starts at 1)
    pub sequence_id: u64,
    /// Sanitized, trimmed text ready for synthesis
    pub text: String,
    /// When the segmenter emitted this unit
    pub submitted_at: Instant,
}

impl TextUnit {
    /// Create a new text unit
    pub fn new(sequence_id: u64, text: impl Into<String>) -> Self {
        Self {
            sequence_id,
            text: text.into(),
            submitted_at: Instant::now(),
        }
    }

    /// Word count of the fragment
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Time elapsed since the segmenter emitted this unit
    pub fn age(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

/// Synthesized audio for one [`TextUnit`]
///
/// Built by the generation stage, consumed (by move) by the playback stage.
#[derive(Debug, Clone)]
pub struct AudioUnit {
    /// Matches the source text unit's sequence id
    pub sequence_id: u64,
    /// Opaque encoded audio returned by the synthesis backend
    pub audio: Vec<u8>,
    /// Wall time spent synthesizing, including retries
    pub generation_duration: Duration,
    /// True once synthesis succeeded; only generated units reach playback
    pub generated: bool,
    /// Total synthesis attempts (1 = first try succeeded)
    pub attempt_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_unit_word_count() {
        let unit = TextUnit::new(1, "Comment vas-tu aujourd'hui ?");
        assert_eq!(unit.word_count(), 4);
        assert_eq!(unit.sequence_id, 1);
    }

    #[test]
    fn test_audio_unit_fields() {
        let unit = AudioUnit {
            sequence_id: 3,
            audio: vec![0u8; 16],
            generation_duration: Duration::from_millis(120),
            generated: true,
            attempt_count: 2,
        };
        assert!(unit.generated);
        assert_eq!(unit.attempt_count, 2);
    }
}
