//! Streaming audio pipeline
//!
//! Two single-consumer stages connected by bounded queues:
//! - the generation stage synthesizes text units into audio units (with
//!   bounded retry), preserving submission order
//! - the playback stage plays each audio unit to completion before taking
//!   the next, so audible output is ordered and never overlaps
//!
//! Generation of unit N+1 proceeds while unit N is still playing; the
//! controller reports how much latency that overlap hides.

pub mod controller;
pub mod generation;
pub mod playback;
pub mod stats;
pub mod traits;

pub use controller::{AudioPipeline, PipelineConfig, PipelineStatus};
pub use stats::PipelineStats;
pub use traits::{AudioPlayer, PacedPlayer, SpeechSynthesizer, ToneSynthesizer};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("pipeline is not started")]
    NotStarted,

    #[error("pipeline channel closed")]
    ChannelClosed,
}
