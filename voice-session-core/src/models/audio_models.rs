use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SessionError;

/// Sample rate and channel layout of a stream or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub sample_rate: f64,
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: f64, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Duration in milliseconds of `frames` frames at this rate.
    pub fn frames_to_ms(&self, frames: usize) -> u64 {
        if self.sample_rate <= 0.0 {
            return 0;
        }
        (frames as f64 * 1000.0 / self.sample_rate) as u64
    }
}

/// Raw PCM encodings accepted by `play_chunk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleEncoding {
    /// Documented default when a caller gives no encoding at all.
    #[default]
    #[serde(rename = "pcm_s16le")]
    PcmS16Le,
    #[serde(rename = "pcm_f32le")]
    PcmF32Le,
}

impl SampleEncoding {
    /// Bytes per sample for one channel.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::PcmS16Le => 2,
            Self::PcmF32Le => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PcmS16Le => "pcm_s16le",
            Self::PcmF32Le => "pcm_f32le",
        }
    }
}

impl FromStr for SampleEncoding {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pcm_s16le" => Ok(Self::PcmS16Le),
            "pcm_f32le" => Ok(Self::PcmF32Le),
            other => Err(SessionError::UnsupportedFormat(format!(
                "unknown encoding '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio container formats accepted by `play_container`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Wav,
    M4a,
}

impl ContainerKind {
    /// Identify a container from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Self::Wav);
        }
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            return Some(Self::M4a);
        }
        None
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::M4a => "m4a",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::M4a => "audio/m4a",
        }
    }
}

/// Where the samples of an `AudioBuffer` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BufferSource {
    Pcm(SampleEncoding),
    Container(ContainerKind),
}

/// Immutable decoded audio, interleaved f32 in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    format: AudioFormat,
    source: BufferSource,
    samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(format: AudioFormat, source: BufferSource, samples: Vec<f32>) -> Self {
        Self {
            format,
            source,
            samples,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn source(&self) -> BufferSource {
        self.source
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn frame_count(&self) -> usize {
        let channels = self.format.channels.max(1) as usize;
        self.samples.len() / channels
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    pub fn duration_ms(&self) -> u64 {
        self.format.frames_to_ms(self.frame_count())
    }
}

/// Voice processing flavour requested from the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackMode {
    #[default]
    Regular,
    VoiceProcessing,
    Conversation,
}

/// Playback graph configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundConfig {
    pub sample_rate: f64,
    pub channels: u16,
    pub playback_mode: PlaybackMode,
}

impl SoundConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate <= 0.0 {
            return Err("playback sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported playback channel count: {}", self.channels));
        }
        Ok(())
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000.0,
            channels: 1,
            playback_mode: PlaybackMode::Regular,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_parses_known_names() {
        assert_eq!("pcm_s16le".parse::<SampleEncoding>().unwrap(), SampleEncoding::PcmS16Le);
        assert_eq!("pcm_f32le".parse::<SampleEncoding>().unwrap(), SampleEncoding::PcmF32Le);
    }

    #[test]
    fn encoding_rejects_unknown_names() {
        let err = "pcm_u8".parse::<SampleEncoding>().unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedFormat(_)));
    }

    #[test]
    fn sniff_wav_and_m4a() {
        let mut wav = Vec::from(&b"RIFF"[..]);
        wav.extend_from_slice(&[0, 0, 0, 0]);
        wav.extend_from_slice(b"WAVE");
        assert_eq!(ContainerKind::sniff(&wav), Some(ContainerKind::Wav));

        let m4a = [0, 0, 0, 0x20, b'f', b't', b'y', b'p', b'M', b'4', b'A', b' '];
        assert_eq!(ContainerKind::sniff(&m4a), Some(ContainerKind::M4a));

        assert_eq!(ContainerKind::sniff(b"garbage"), None);
    }

    #[test]
    fn frame_count_respects_channels() {
        let buffer = AudioBuffer::new(
            AudioFormat::new(16000.0, 2),
            BufferSource::Pcm(SampleEncoding::PcmF32Le),
            vec![0.0; 8],
        );
        assert_eq!(buffer.frame_count(), 4);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn duration_of_one_second() {
        let buffer = AudioBuffer::new(
            AudioFormat::new(16000.0, 1),
            BufferSource::Pcm(SampleEncoding::PcmS16Le),
            vec![0.0; 16000],
        );
        assert_eq!(buffer.duration_ms(), 1000);
    }
}
