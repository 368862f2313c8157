//! Sentence segmentation over an incremental token stream
//!
//! The segmenter accumulates tokens and emits a [`TextUnit`] the moment the
//! buffer reads as a complete sentence, so synthesis can start while the
//! rest of the response is still being generated.

use unicode_segmentation::UnicodeSegmentation;

use voice_assistant_core::TextUnit;

use crate::sanitize::sanitize_for_speech;

/// Punctuation that closes a speakable unit
const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', ':', ';'];

/// Segmenter tuning
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Strip thinking spans, emoji and emphasis before emission
    pub sanitize: bool,
    /// Word threshold for the short question/exclamation rule
    pub min_clause_words: usize,
    /// Maximum characters per chunk in [`split_for_streaming`]
    pub max_chunk_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sanitize: true,
            min_clause_words: 4,
            max_chunk_chars: 150,
        }
    }
}

/// Accumulates tokens and emits speakable units at sentence boundaries
///
/// One instance serves one turn; sequence ids restart at 1 per instance.
#[derive(Debug)]
pub struct SentenceSegmenter {
    config: SegmenterConfig,
    buffer: String,
    next_sequence: u64,
}

impl SentenceSegmenter {
    /// Create a segmenter for one turn
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            next_sequence: 1,
        }
    }

    /// Feed one token; returns a unit when the buffer closes a sentence
    pub fn feed(&mut self, token: &str) -> Option<TextUnit> {
        self.buffer.push_str(token);
        if self.is_sentence_complete() {
            self.emit()
        } else {
            None
        }
    }

    /// Emit any non-empty remainder at stream end
    pub fn flush(&mut self) -> Option<TextUnit> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        self.emit()
    }

    /// Buffered text not yet emitted
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn is_sentence_complete(&self) -> bool {
        let text = self.buffer.trim_end();
        let Some(last) = text.chars().last() else {
            return false;
        };

        if SENTENCE_TERMINATORS.contains(&last) {
            return true;
        }

        // Short clauses read as complete once they end on a question or
        // exclamation mark and carry enough words.
        matches!(last, '?' | '!')
            && text.unicode_words().count() >= self.config.min_clause_words
    }

    fn emit(&mut self) -> Option<TextUnit> {
        let raw = std::mem::take(&mut self.buffer);
        let trimmed = raw.trim();

        let text = if self.config.sanitize {
            sanitize_for_speech(trimmed)
        } else {
            trimmed.to_string()
        };

        if text.is_empty() {
            tracing::debug!("segment discarded after sanitization");
            return None;
        }

        let unit = TextUnit::new(self.next_sequence, text);
        self.next_sequence += 1;
        Some(unit)
    }
}

/// Split a complete text into speakable chunks of at most `max_len` chars
///
/// Splits on sentence boundaries first; a sentence longer than `max_len`
/// falls back to word-level splitting. Used when a caller holds a finished
/// response instead of a token stream.
pub fn split_for_streaming(text: &str, max_len: usize) -> Vec<String> {
    let text = text.trim();
    if text.len() <= max_len {
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let sentences = text
        .replace(". ", ".|")
        .replace("! ", "!|")
        .replace("? ", "?|");

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences.split('|') {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current.len() + sentence.len() <= max_len {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if sentence.len() <= max_len {
            current.push_str(sentence);
        } else {
            // Oversized sentence: split on words
            for word in sentence.split_whitespace() {
                if !current.is_empty() && current.len() + word.len() + 1 > max_len {
                    chunks.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(segmenter: &mut SentenceSegmenter, tokens: &[&str]) -> Vec<String> {
        let mut units: Vec<String> = tokens
            .iter()
            .filter_map(|t| segmenter.feed(t))
            .map(|u| u.text)
            .collect();
        if let Some(unit) = segmenter.flush() {
            units.push(unit.text);
        }
        units
    }

    #[test]
    fn test_two_sentences_from_token_stream() {
        let mut segmenter = SentenceSegmenter::new(SegmenterConfig::default());
        let units = feed_all(
            &mut segmenter,
            &["Bonjour", ".", " Comment", " vas", "-tu", "?"],
        );
        assert_eq!(units, vec!["Bonjour.", "Comment vas-tu?"]);
    }

    #[test]
    fn test_sequence_ids_are_monotonic() {
        let mut segmenter = SentenceSegmenter::new(SegmenterConfig::default());
        let first = segmenter.feed("One.").unwrap();
        let second = segmenter.feed("Two.").unwrap();
        assert_eq!(first.sequence_id, 1);
        assert_eq!(second.sequence_id, 2);
    }

    #[test]
    fn test_flush_emits_remainder() {
        let mut segmenter = SentenceSegmenter::new(SegmenterConfig::default());
        assert!(segmenter.feed("trailing words without").is_none());
        assert!(segmenter.feed(" punctuation").is_none());
        let unit = segmenter.flush().unwrap();
        assert_eq!(unit.text, "trailing words without punctuation");
        assert!(segmenter.flush().is_none());
    }

    #[test]
    fn test_colon_and_semicolon_close_units() {
        let mut segmenter = SentenceSegmenter::new(SegmenterConfig::default());
        assert!(segmenter.feed("First part;").is_some());
        assert!(segmenter.feed("then a list:").is_some());
    }

    #[test]
    fn test_sanitized_empty_segment_is_discarded() {
        let mut segmenter = SentenceSegmenter::new(SegmenterConfig::default());
        assert!(segmenter.feed("*nods slowly.*").is_none());
        assert!(segmenter.flush().is_none());
        // The next real sentence still comes out, with a contiguous id
        let unit = segmenter.feed("Hello.").unwrap();
        assert_eq!(unit.sequence_id, 1);
    }

    #[test]
    fn test_reassembly_with_sanitization_disabled() {
        let config = SegmenterConfig {
            sanitize: false,
            ..Default::default()
        };
        let mut segmenter = SentenceSegmenter::new(config);

        let tokens = ["Hel", "lo", ". ", "How ", "are ", "you", "? ", "Fine"];
        let units = feed_all(&mut segmenter, &tokens);

        // Boundaries fall only at terminators or stream end, and the
        // concatenation preserves every word of the input.
        let joined = tokens.concat();
        let original: Vec<&str> = joined.split_whitespace().collect();
        let reassembled_owned = units.join(" ");
        let reassembled: Vec<&str> = reassembled_owned.split_whitespace().collect();
        assert_eq!(reassembled, original);
        for unit in &units[..units.len() - 1] {
            let last = unit.trim_end().chars().last().unwrap();
            assert!(SENTENCE_TERMINATORS.contains(&last));
        }
    }

    #[test]
    fn test_split_for_streaming_short_text_is_one_chunk() {
        assert_eq!(split_for_streaming("Short.", 150), vec!["Short."]);
    }

    #[test]
    fn test_split_for_streaming_respects_sentences() {
        let text = "This is the first sentence. This is the second one. And a third sentence here.";
        let chunks = split_for_streaming(text, 40);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 40, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn test_split_for_streaming_breaks_oversized_sentences() {
        let text = "word ".repeat(60);
        let chunks = split_for_streaming(&text, 30);
        assert!(chunks.len() > 5);
        for chunk in &chunks {
            assert!(chunk.len() <= 30);
        }
    }
}
