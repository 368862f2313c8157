//! Text processing for the streaming response pipeline
//!
//! Turns an incrementally produced token stream into speakable units the
//! instant a sentence boundary appears, and strips content that should never
//! reach the synthesizer (thinking spans, emoji, emphasis markers).

pub mod sanitize;
pub mod segmenter;

pub use sanitize::sanitize_for_speech;
pub use segmenter::{split_for_streaming, SegmenterConfig, SentenceSegmenter};
