//! Voice configuration and its single mutation path

use std::fs;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Audio synthesis configuration for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Synthesis model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Target voice within the model
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speaking rate (1.0 = normal)
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// Output volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_model() -> String {
    "neural-v1".to_string()
}
fn default_voice() -> String {
    "nova".to_string()
}
fn default_speed() -> f32 {
    1.0
}
fn default_volume() -> f32 {
    0.8
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            voice: default_voice(),
            speed: default_speed(),
            volume: default_volume(),
        }
    }
}

/// Partial voice configuration update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceConfigPatch {
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub volume: Option<f32>,
}

impl VoiceConfigPatch {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.voice.is_none() && self.speed.is_none() && self.volume.is_none()
    }
}

/// Owns the active voice configuration and persists changes
///
/// This is the only path through which a session's audio configuration
/// changes; the pipeline reads a snapshot per generated unit.
pub struct VoiceManager {
    current: RwLock<VoiceConfig>,
    path: Option<PathBuf>,
}

impl VoiceManager {
    /// In-memory manager starting from the given configuration
    pub fn new(initial: VoiceConfig) -> Self {
        Self {
            current: RwLock::new(initial),
            path: None,
        }
    }

    /// Manager backed by a TOML file; loads it if present, else defaults
    pub fn with_persistence(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = match fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<VoiceConfig>(&raw) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), voice = %config.voice, "voice configuration loaded");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid voice configuration, using defaults");
                    VoiceConfig::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "no saved voice configuration, using defaults");
                VoiceConfig::default()
            }
        };

        Self {
            current: RwLock::new(initial),
            path: Some(path),
        }
    }

    /// Snapshot of the active configuration
    pub fn current(&self) -> VoiceConfig {
        self.current.read().clone()
    }

    /// Apply a partial update, validate, persist, and return the result
    pub fn apply(&self, patch: VoiceConfigPatch) -> Result<VoiceConfig, ConfigError> {
        let mut updated = self.current();

        if let Some(model) = patch.model {
            updated.model = model;
        }
        if let Some(voice) = patch.voice {
            updated.voice = voice;
        }
        if let Some(speed) = patch.speed {
            updated.speed = speed;
        }
        if let Some(volume) = patch.volume {
            updated.volume = volume;
        }

        Self::validate(&updated)?;

        *self.current.write() = updated.clone();
        self.save(&updated)?;

        tracing::info!(model = %updated.model, voice = %updated.voice, "voice configuration updated");
        Ok(updated)
    }

    fn validate(config: &VoiceConfig) -> Result<(), ConfigError> {
        if !(0.25..=4.0).contains(&config.speed) {
            return Err(ConfigError::InvalidValue {
                field: "speed".to_string(),
                message: format!("{} is outside 0.25..=4.0", config.speed),
            });
        }
        if !(0.0..=1.0).contains(&config.volume) {
            return Err(ConfigError::InvalidValue {
                field: "volume".to_string(),
                message: format!("{} is outside 0.0..=1.0", config.volume),
            });
        }
        if config.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "model".to_string(),
                message: "model id must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn save(&self, config: &VoiceConfig) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let raw = toml::to_string_pretty(config).map_err(|e| ConfigError::Persist(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Persist(e.to_string()))?;
        }
        fs::write(path, raw).map_err(|e| ConfigError::Persist(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_patch() {
        let manager = VoiceManager::new(VoiceConfig::default());

        let updated = manager
            .apply(VoiceConfigPatch {
                voice: Some("aria".to_string()),
                speed: Some(1.2),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.voice, "aria");
        assert_eq!(updated.speed, 1.2);
        assert_eq!(manager.current().voice, "aria");
    }

    #[test]
    fn test_invalid_patch_is_rejected_and_not_applied() {
        let manager = VoiceManager::new(VoiceConfig::default());
        let before = manager.current();

        let result = manager.apply(VoiceConfigPatch {
            speed: Some(10.0),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(manager.current(), before);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let path = std::env::temp_dir().join(format!("voice-config-{}.toml", std::process::id()));
        let _ = fs::remove_file(&path);

        let manager = VoiceManager::with_persistence(&path);
        manager
            .apply(VoiceConfigPatch {
                voice: Some("echo".to_string()),
                ..Default::default()
            })
            .unwrap();

        let reloaded = VoiceManager::with_persistence(&path);
        assert_eq!(reloaded.current().voice, "echo");

        let _ = fs::remove_file(&path);
    }
}
