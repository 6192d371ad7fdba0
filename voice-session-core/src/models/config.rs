use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::audio_models::SoundConfig;
use super::error::SessionError;

/// Shortest allowed metering poll interval.
pub const MIN_METERING_INTERVAL_MS: u64 = 100;

/// Engine-wide configuration.
///
/// Loadable from JSON; every field is optional and falls back to
/// `EngineConfiguration::default()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfiguration {
    /// Playback graph format and mode (default: 16 kHz mono, regular).
    pub sound: SoundConfig,

    /// Directory where recordings are written.
    pub recordings_directory: PathBuf,

    /// Scheduler retry delay while the output graph is unavailable (default: 50 ms).
    pub scheduler_backoff_ms: u64,

    /// Metering interval used when a caller passes none (default: 1000 ms).
    pub default_metering_interval_ms: u64,

    /// Floor of the level normalization window in dBFS (default: -60).
    pub level_floor_db: f32,
}

impl EngineConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        self.sound.validate()?;
        if self.scheduler_backoff_ms == 0 || self.scheduler_backoff_ms > 1000 {
            return Err(format!(
                "scheduler backoff must be within 1..=1000 ms, got {}",
                self.scheduler_backoff_ms
            ));
        }
        if self.default_metering_interval_ms < MIN_METERING_INTERVAL_MS {
            return Err(format!(
                "metering interval must be at least {} ms",
                MIN_METERING_INTERVAL_MS
            ));
        }
        if !(-160.0..0.0).contains(&self.level_floor_db) {
            return Err(format!(
                "level floor must be within [-160, 0) dBFS, got {}",
                self.level_floor_db
            ));
        }
        Ok(())
    }

    pub fn scheduler_backoff(&self) -> Duration {
        Duration::from_millis(self.scheduler_backoff_ms)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SessionError::InvalidConfiguration(format!("failed to parse configuration: {}", e)))?;
        config.validate().map_err(SessionError::InvalidConfiguration)?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SessionError::FileIoFailure(format!("failed to read configuration: {}", e)))?;
        Self::from_json_str(&json)
    }
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            sound: SoundConfig::default(),
            recordings_directory: std::env::temp_dir().join("voice-session"),
            scheduler_backoff_ms: 50,
            default_metering_interval_ms: 1000,
            level_floor_db: -60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::PlaybackMode;

    #[test]
    fn default_is_valid() {
        assert!(EngineConfiguration::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfiguration::from_json_str(
            r#"{ "sound": { "sampleRate": 24000, "playbackMode": "conversation" }, "schedulerBackoffMs": 20 }"#,
        )
        .unwrap();
        assert_eq!(config.sound.sample_rate, 24000.0);
        assert_eq!(config.sound.channels, 1);
        assert_eq!(config.sound.playback_mode, PlaybackMode::Conversation);
        assert_eq!(config.scheduler_backoff_ms, 20);
        assert_eq!(config.default_metering_interval_ms, 1000);
    }

    #[test]
    fn rejects_short_metering_interval() {
        let config = EngineConfiguration {
            default_metering_interval_ms: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_channel_count() {
        let err = EngineConfiguration::from_json_str(r#"{ "sound": { "channels": 6 } }"#).unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration(_)));
    }
}
