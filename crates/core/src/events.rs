//! Events broadcast to connected clients
//!
//! Serialized as JSON with a `type` tag; the tag values and field names are
//! part of the client protocol.

use serde::{Deserialize, Serialize};

/// Aggregate metrics attached to `llm_complete`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TurnMetrics {
    /// Wall time for the whole turn, seconds
    pub total_time: f64,
    /// Tokens produced by the source
    pub token_count: usize,
    /// Time to first token, seconds
    pub ttft: f64,
    /// Time until the first unit reached the pipeline, seconds
    pub first_audio_time: f64,
    pub tokens_per_second: f64,
    /// Pipeline overlap efficiency, percent
    pub pipeline_efficiency: f64,
}

/// Lifecycle and progress events for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// Connection or initialization status
    Status {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        persona: Option<String>,
    },
    /// Turn-level failure surfaced to the client
    Error { content: String },
    /// Microphone capture started
    ListeningStart,
    /// Microphone capture ended
    ListeningEnd,
    /// Transcript of a voice input
    Transcription { content: String },
    /// An admitted input entered processing
    MessageProcessingStart { content: String },
    /// First token of the response arrived
    FirstToken { content: String, ttft: f64 },
    /// One response token
    LlmToken { content: String },
    /// Response finished; carries the full text and aggregate metrics
    LlmComplete {
        content: String,
        #[serde(flatten)]
        metrics: TurnMetrics,
    },
    /// Result of a configuration update request
    ConfigUpdated { success: bool, message: String },
    /// Keep-alive reply
    Pong,
}
