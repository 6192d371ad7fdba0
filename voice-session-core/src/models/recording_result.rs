use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::recording_settings::CaptureMode;

/// Returned when a capture starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResult {
    pub mode: CaptureMode,
    /// Empty for streaming captures that do not persist to a file.
    pub file_uri: String,
    pub mime_type: String,
    pub sample_rate: f64,
    pub channels: Option<u16>,
    pub bit_depth: Option<u16>,
}

/// Result of a finished capture.
///
/// Optional fields are `None` when the value cannot be derived; they are
/// never filled with a guessed constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResult {
    pub file_uri: String,
    pub filename: String,
    pub mime_type: String,
    pub duration_ms: u64,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    #[serde(skip)]
    pub file_path: PathBuf,
}

/// Metadata sidecar stored next to a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub id: String,
    pub mode: CaptureMode,
    pub file_path: String,
    pub mime_type: String,
    pub duration_ms: u64,
    pub size_bytes: u64,
    pub channels: Option<u16>,
    pub bit_depth: Option<u16>,
    pub sample_rate: Option<f64>,
    pub checksum: Option<String>,
    pub created_at: String,
}

impl RecordingMetadata {
    pub fn from_result(
        id: &str,
        mode: CaptureMode,
        result: &RecordingResult,
        checksum: Option<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            mode,
            file_path: result.file_path.to_string_lossy().into_owned(),
            mime_type: result.mime_type.clone(),
            duration_ms: result.duration_ms,
            size_bytes: result.size_bytes,
            channels: result.channels,
            bit_depth: result.bit_depth,
            sample_rate: result.sample_rate,
            checksum,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// `file://` URI for a local path.
pub fn file_uri(path: &Path) -> String {
    let path = path.to_string_lossy();
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path.replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_path_uri() {
        assert_eq!(file_uri(Path::new("/tmp/a.wav")), "file:///tmp/a.wav");
    }

    #[test]
    fn unknown_fields_are_omitted_from_json() {
        let result = RecordingResult {
            file_uri: "file:///tmp/a.m4a".into(),
            filename: "a.m4a".into(),
            mime_type: "audio/m4a".into(),
            duration_ms: 1200,
            size_bytes: 10,
            channels: Some(1),
            bit_depth: None,
            sample_rate: None,
            file_path: PathBuf::from("/tmp/a.m4a"),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["durationMs"], 1200);
        assert!(json.get("bitDepth").is_none());
        assert!(json.get("sampleRate").is_none());
        assert!(json.get("filePath").is_none());
    }
}
