//! Cumulative pipeline statistics

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of cumulative pipeline counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PipelineStats {
    /// Units accepted into the generation queue
    pub units_submitted: u64,
    /// Units synthesized successfully
    pub units_generated: u64,
    /// Units dropped after retry exhaustion
    pub units_dropped: u64,
    /// Units played to completion
    pub units_played: u64,
    /// Units abandoned by playback (backend failure or timeout)
    pub units_abandoned: u64,
    /// Turns drained through the pipeline
    pub turns_handled: u64,
    /// Total synthesis wall time, seconds
    pub total_generation_time: f64,
    /// Total playback wall time, seconds
    pub total_playback_time: f64,
    /// Share of generation+playback time hidden by overlapping, percent
    pub overlap_efficiency: f64,
}

impl PipelineStats {
    /// Units currently somewhere between submission and final disposition
    pub fn in_flight(&self) -> u64 {
        self.units_submitted
            .saturating_sub(self.units_played + self.units_dropped + self.units_abandoned)
    }
}

/// Shared recorder the stage workers write into
#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: Mutex<PipelineStats>,
}

impl StatsRecorder {
    pub fn record_submitted(&self) {
        self.inner.lock().units_submitted += 1;
    }

    pub fn record_generated(&self, took: Duration) {
        let mut stats = self.inner.lock();
        stats.units_generated += 1;
        stats.total_generation_time += took.as_secs_f64();
        drop(stats);
        metrics::counter!("pipeline_units_generated_total").increment(1);
        metrics::histogram!("pipeline_generation_seconds").record(took.as_secs_f64());
    }

    pub fn record_dropped(&self) {
        self.inner.lock().units_dropped += 1;
        metrics::counter!("pipeline_units_dropped_total").increment(1);
    }

    pub fn record_played(&self, took: Duration) {
        let mut stats = self.inner.lock();
        stats.units_played += 1;
        stats.total_playback_time += took.as_secs_f64();
        drop(stats);
        metrics::counter!("pipeline_units_played_total").increment(1);
        metrics::histogram!("pipeline_playback_seconds").record(took.as_secs_f64());
    }

    pub fn record_abandoned(&self) {
        self.inner.lock().units_abandoned += 1;
        metrics::counter!("pipeline_units_abandoned_total").increment(1);
    }

    pub fn record_turn(&self) {
        self.inner.lock().turns_handled += 1;
    }

    /// Snapshot with the overlap efficiency computed on the way out
    pub fn snapshot(&self) -> PipelineStats {
        let mut stats = *self.inner.lock();
        stats.overlap_efficiency =
            overlap_efficiency(stats.total_generation_time, stats.total_playback_time);
        stats
    }
}

/// Latency hidden by running generation and playback concurrently
///
/// `(gen + play - max(gen, play)) / (gen + play)`, as a percentage. Equal
/// stage times give 50%: half the sequential cost disappears behind the
/// other stage.
fn overlap_efficiency(generation: f64, playback: f64) -> f64 {
    let sequential = generation + playback;
    if sequential <= 0.0 {
        return 0.0;
    }
    let pipelined = generation.max(playback);
    (sequential - pipelined) / sequential * 100.0
}
