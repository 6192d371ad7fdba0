use serde::{Deserialize, Serialize};

/// Capture mode, selected at capture start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    /// File recording at hardware defaults; only levels reach the consumer.
    Metering,
    /// Raw PCM chunks plus a per-chunk level.
    Streaming,
}

/// Encoder quality of a lossy recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncoderQuality {
    Min,
    Low,
    Medium,
    High,
    Max,
}

/// Capture parameters for streaming mode. Immutable once a capture starts.
///
/// `None` fields fall back to the hardware defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingSettings {
    pub sample_rate: Option<f64>,
    pub channels: Option<u16>,
    /// 8, 16 or 32 (float). Default 16.
    pub bit_depth: Option<u16>,
    /// Resample target applied before chunks are encoded.
    pub desired_sample_rate: Option<f64>,
    /// Also write the streamed PCM to a WAV file.
    pub persist_to_file: bool,
}

impl RecordingSettings {
    pub fn validate(&self) -> Result<(), String> {
        for rate in [self.sample_rate, self.desired_sample_rate].into_iter().flatten() {
            if rate <= 0.0 {
                return Err(format!("sample rate must be positive, got {}", rate));
            }
        }
        if let Some(channels) = self.channels {
            if ![1, 2].contains(&channels) {
                return Err(format!("unsupported channel count: {}", channels));
            }
        }
        if let Some(bit_depth) = self.bit_depth {
            if ![8, 16, 32].contains(&bit_depth) {
                return Err(format!("unsupported bit depth: {}", bit_depth));
            }
        }
        Ok(())
    }

    pub fn bit_depth_or_default(&self) -> u16 {
        self.bit_depth.unwrap_or(16)
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: None,
            bit_depth: None,
            desired_sample_rate: None,
            persist_to_file: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RecordingSettings::default().validate().is_ok());
        assert_eq!(RecordingSettings::default().bit_depth_or_default(), 16);
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let settings = RecordingSettings {
            bit_depth: Some(24),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_desired_rate() {
        let settings = RecordingSettings {
            desired_sample_rate: Some(0.0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
