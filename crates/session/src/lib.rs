//! Session layer: admission control and turn orchestration
//!
//! One accepted input becomes one conversational turn. The admission gate
//! rejects duplicates up front; the orchestrator drives the token stream
//! through the segmenter into the audio pipeline while relaying progress
//! events, and serializes turns behind a single-holder guard.

pub mod admission;
pub mod history;
pub mod orchestrator;
pub mod source;

pub use admission::{AdmissionGate, GateConfig};
pub use history::ConversationHistory;
pub use orchestrator::{SessionConfig, SessionOrchestrator, TurnPhase};
pub use source::{
    EchoTokenSource, SilentRecognizer, SourceError, SpeechRecognizer, TokenSource, TokenStream,
};

use thiserror::Error;

use voice_assistant_pipeline::PipelineError;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session is not initialized")]
    NotInitialized,

    #[error("token source error: {0}")]
    Source(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] voice_assistant_config::ConfigError),
}
