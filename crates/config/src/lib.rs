//! Configuration for the streaming voice assistant
//!
//! Two layers live here:
//! - [`Settings`]: process-wide configuration loaded from files and the
//!   environment at startup
//! - [`VoiceManager`]: the runtime voice configuration and its single
//!   mutation path, persisted between runs

pub mod settings;
pub mod voice;

pub use settings::{
    load_settings, ObservabilityConfig, PipelineSettings, ServerConfig, SessionSettings, Settings,
};
pub use voice::{VoiceConfig, VoiceConfigPatch, VoiceManager};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to persist voice configuration: {0}")]
    Persist(String),
}
