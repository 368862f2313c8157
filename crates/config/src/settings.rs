//! Main settings module
//!
//! Settings load in layers: `config/default`, then `config/{env}`, then
//! `VOICE_ASSISTANT__`-prefixed environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Streaming pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Session and admission configuration
    #[serde(default)]
    pub session: SessionSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Path to the persisted voice configuration
    #[serde(default = "default_voice_config_path")]
    pub voice_config_path: String,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.text_queue_capacity == 0 || self.pipeline.audio_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.queue_capacity".to_string(),
                message: "queue capacities must be at least 1".to_string(),
            });
        }

        if self.session.drain_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.drain_poll_ms".to_string(),
                message: "drain poll interval must be non-zero".to_string(),
            });
        }

        if self.session.dedup_retention_ms < self.session.dedup_window_ms {
            return Err(ConfigError::InvalidValue {
                field: "session.dedup_retention_ms".to_string(),
                message: "retention must be at least the dedup window".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable permissive CORS (development)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_voice_config_path() -> String {
    "config/voice.toml".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
        }
    }
}

/// Streaming pipeline configuration
///
/// The timing values are empirically chosen defaults, not invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Capacity of the text unit queue feeding generation
    #[serde(default = "default_text_queue_capacity")]
    pub text_queue_capacity: usize,

    /// Capacity of the audio unit queue feeding playback
    #[serde(default = "default_audio_queue_capacity")]
    pub audio_queue_capacity: usize,

    /// Synthesis retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff in milliseconds, scaled linearly per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Idle heartbeat interval for stage workers, seconds
    #[serde(default = "default_idle_log_secs")]
    pub idle_log_secs: u64,

    /// Force-stop budget for a single playback, seconds
    #[serde(default = "default_playback_timeout_secs")]
    pub playback_timeout_secs: u64,

    /// Short phrase synthesized asynchronously to warm a cold backend
    #[serde(default = "default_warm_up_text")]
    pub warm_up_text: String,
}

fn default_text_queue_capacity() -> usize {
    50
}
fn default_audio_queue_capacity() -> usize {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_idle_log_secs() -> u64 {
    30
}
fn default_playback_timeout_secs() -> u64 {
    30
}
fn default_warm_up_text() -> String {
    "Ready.".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            text_queue_capacity: default_text_queue_capacity(),
            audio_queue_capacity: default_audio_queue_capacity(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            idle_log_secs: default_idle_log_secs(),
            playback_timeout_secs: default_playback_timeout_secs(),
            warm_up_text: default_warm_up_text(),
        }
    }
}

/// Session and admission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Window within which identical inbound messages are duplicates, ms
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,

    /// Age past which seen hashes are evicted, ms
    #[serde(default = "default_dedup_retention_ms")]
    pub dedup_retention_ms: u64,

    /// Maximum retained history entries (FIFO eviction)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Minimum drain budget after the token stream ends, seconds
    #[serde(default = "default_min_drain_secs")]
    pub min_drain_secs: u64,

    /// Additional drain budget per generated token, ms
    #[serde(default = "default_drain_per_token_ms")]
    pub drain_per_token_ms: u64,

    /// Interval between drain polls, ms
    #[serde(default = "default_drain_poll_ms")]
    pub drain_poll_ms: u64,

    /// Microphone capture budget for a voice turn, seconds
    #[serde(default = "default_listen_timeout_secs")]
    pub listen_timeout_secs: u64,

    /// Trailing silence that ends a voice capture, ms
    #[serde(default = "default_listen_silence_ms")]
    pub listen_silence_ms: u64,
}

fn default_dedup_window_ms() -> u64 {
    2000
}
fn default_dedup_retention_ms() -> u64 {
    10_000
}
fn default_history_limit() -> usize {
    100
}
fn default_min_drain_secs() -> u64 {
    60
}
fn default_drain_per_token_ms() -> u64 {
    300
}
fn default_drain_poll_ms() -> u64 {
    500
}
fn default_listen_timeout_secs() -> u64 {
    15
}
fn default_listen_silence_ms() -> u64 {
    1500
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window_ms(),
            dedup_retention_ms: default_dedup_retention_ms(),
            history_limit: default_history_limit(),
            min_drain_secs: default_min_drain_secs(),
            drain_per_token_ms: default_drain_per_token_ms(),
            drain_poll_ms: default_drain_poll_ms(),
            listen_timeout_secs: default_listen_timeout_secs(),
            listen_silence_ms: default_listen_silence_ms(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format
    #[serde(default)]
    pub log_json: bool,

    /// Expose the Prometheus scrape endpoint
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`VOICE_ASSISTANT__` prefix)
/// 2. `config/{env}` (if an environment name is given)
/// 3. `config/default`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_ASSISTANT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
