use std::fs;
use std::path::Path;

use crate::models::audio_models::ContainerKind;
use crate::models::error::SessionError;
use crate::models::recording_result::{file_uri, RecordingResult};
use crate::models::recording_settings::EncoderQuality;
use crate::traits::capture_provider::RecorderSettings;

/// Approximate bit depth of a lossy encoder at `quality`.
///
/// Deterministic mapping: min → 8, low → 12, medium/high/max → 16.
pub fn estimate_bit_depth(quality: EncoderQuality) -> u16 {
    match quality {
        EncoderQuality::Min => 8,
        EncoderQuality::Low => 12,
        EncoderQuality::Medium | EncoderQuality::High | EncoderQuality::Max => 16,
    }
}

/// Bit depth to report for a recording: exact for PCM containers, estimated
/// from encoder quality for lossy ones, `None` when neither is known.
pub fn reported_bit_depth(settings: &RecorderSettings) -> Option<u16> {
    match settings.container {
        ContainerKind::Wav => settings.bit_depth,
        ContainerKind::M4a => settings.bit_depth.or_else(|| settings.quality.map(estimate_bit_depth)),
    }
}

/// Assemble the result of a finished capture from the file on disk.
///
/// `duration_ms` is the active capture time, paused time already excluded.
pub fn build_result(
    file_path: &Path,
    settings: &RecorderSettings,
    duration_ms: u64,
) -> Result<RecordingResult, SessionError> {
    let size_bytes = fs::metadata(file_path)
        .map_err(|e| SessionError::FileIoFailure(format!("failed to stat recording {}: {}", file_path.display(), e)))?
        .len();
    let filename = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(RecordingResult {
        file_uri: file_uri(file_path),
        filename,
        mime_type: settings.container.mime_type().to_string(),
        duration_ms,
        size_bytes,
        channels: settings.channels,
        bit_depth: reported_bit_depth(settings),
        sample_rate: settings.sample_rate,
        file_path: file_path.to_path_buf(),
    })
}
