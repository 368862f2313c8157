//! Inbound request admission
//!
//! Two mechanisms stack here: a dedup window keyed on content hashes, and a
//! single-holder turn guard. Admission does not guarantee immediate
//! processing; an accepted message arriving mid-turn waits on the guard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{watch, Mutex, MutexGuard};

use voice_assistant_core::InboundMessage;

/// Admission gate tuning
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Window within which an identical message is a duplicate
    pub dedup_window: Duration,
    /// Age past which seen hashes are evicted
    pub retention: Duration,
    /// Interval between eviction sweeps
    pub sweep_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(2),
            retention: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Deduplication plus single-flight serialization for inbound turns
pub struct AdmissionGate {
    config: GateConfig,
    recent: DashMap<String, Instant>,
    turn_guard: Mutex<()>,
}

impl AdmissionGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            recent: DashMap::new(),
            turn_guard: Mutex::new(()),
        }
    }

    /// Accept unless an identical message was seen inside the dedup window
    ///
    /// Check and record are one atomic step, so concurrent duplicates
    /// cannot both be admitted.
    pub fn admit(&self, message: &InboundMessage) -> bool {
        let now = Instant::now();

        match self.recent.entry(message.content_hash.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.config.dedup_window {
                    tracing::warn!(kind = ?message.kind, "duplicate message rejected");
                    return false;
                }
                entry.insert(now);
                true
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Take the single-holder guard serializing turn processing
    ///
    /// Held for the whole turn; later callers wait rather than fail.
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn_guard.lock().await
    }

    /// Hashes currently tracked (bounded by the background sweep)
    pub fn tracked(&self) -> usize {
        self.recent.len()
    }

    /// Evict hashes older than the retention horizon
    pub fn sweep(&self) {
        let retention = self.config.retention;
        let before = self.recent.len();
        self.recent.retain(|_, seen| seen.elapsed() < retention);
        let evicted = before - self.recent.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.recent.len(), "dedup hashes evicted");
        }
    }

    /// Start the background sweep task; returns its shutdown sender
    pub fn start_sweeper(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let gate = Arc::clone(self);
        let interval = gate.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => gate.sweep(),
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("admission sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
