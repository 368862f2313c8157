//! Conversation history entries and running session statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker role for a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Token count for assistant turns, 0 for user turns
    pub token_count: usize,
}

impl Turn {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            token_count: 0,
        }
    }

    /// An assistant turn with its generated token count
    pub fn assistant(content: impl Into<String>, token_count: usize) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            token_count,
        }
    }
}

/// Running statistics over all completed turns in a session
///
/// Averages are running weighted means over completed turns.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Completed turns
    pub messages: usize,
    /// Total tokens generated
    pub tokens: usize,
    /// Total wall time spent in turns, seconds
    pub total_time: f64,
    /// Mean time-to-first-token, seconds
    pub avg_ttft: f64,
    /// Mean time until the first unit reached the pipeline, seconds
    pub avg_first_audio_time: f64,
    /// Mean pipeline overlap efficiency, percent
    pub avg_pipeline_efficiency: f64,
}
