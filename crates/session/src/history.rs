//! Conversation history with FIFO capping and running statistics

use std::collections::VecDeque;

use voice_assistant_core::{SessionStats, Turn, TurnMetrics};

/// Capped conversation history owned by the orchestrator
///
/// Single writer; external readers get snapshots.
#[derive(Debug)]
pub struct ConversationHistory {
    limit: usize,
    turns: VecDeque<Turn>,
    stats: SessionStats,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            turns: VecDeque::with_capacity(limit.min(128)),
            stats: SessionStats::default(),
        }
    }

    /// Append a turn, evicting the oldest entries past the cap
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }

    /// Snapshot of the retained turns, oldest first
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Fold one completed turn's metrics into the running weighted means
    pub fn record_turn_metrics(&mut self, metrics: &TurnMetrics) {
        self.stats.messages += 1;
        self.stats.tokens += metrics.token_count;
        self.stats.total_time += metrics.total_time;

        let count = self.stats.messages as f64;
        self.stats.avg_ttft = (self.stats.avg_ttft * (count - 1.0) + metrics.ttft) / count;
        self.stats.avg_first_audio_time =
            (self.stats.avg_first_audio_time * (count - 1.0) + metrics.first_audio_time) / count;

        if metrics.pipeline_efficiency > 0.0 {
            self.stats.avg_pipeline_efficiency = (self.stats.avg_pipeline_efficiency
                * (count - 1.0)
                + metrics.pipeline_efficiency)
                / count;
        }
    }

    /// Drop all turns and reset the statistics
    pub fn clear(&mut self) {
        self.turns.clear();
        self.stats = SessionStats::default();
    }
}
