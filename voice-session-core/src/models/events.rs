use serde::Serialize;

/// Turn id whose chunks never produce chunk-played events.
pub const SUSPEND_SOUND_EVENTS_TURN_ID: &str = "suspend-sound-events";

/// Which capture path produced an `AudioDataEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioDataMode {
    Recording,
    Microphone,
}

/// Level (and, in streaming mode, audio) delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDataEvent {
    pub mode: AudioDataMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_uri: Option<String>,
    /// Level in dBFS within `[-160, 0]`.
    pub sound_level_dbfs: f32,
    /// Base64 chunk bytes (streaming mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_chunk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_position_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

impl AudioDataEvent {
    pub fn recording(file_uri: String, sound_level_dbfs: f32) -> Self {
        Self {
            mode: AudioDataMode::Recording,
            file_uri: Some(file_uri),
            sound_level_dbfs,
            encoded_chunk: None,
            chunk_position_ms: None,
            chunk_size: None,
            total_size: None,
            stream_id: None,
        }
    }
}

/// Why the output route changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceReconnectedReason {
    NewDeviceAvailable,
    OldDeviceUnavailable,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPlayedEvent {
    /// No entry remains queued after this one.
    pub is_final: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_event_omits_stream_fields() {
        let event = AudioDataEvent::recording("file:///tmp/a.wav".into(), -42.5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["mode"], "recording");
        assert_eq!(json["soundLevelDbfs"], -42.5);
        assert!(json.get("encodedChunk").is_none());
    }

    #[test]
    fn reason_tags_match_wire_names() {
        let json = serde_json::to_string(&DeviceReconnectedReason::OldDeviceUnavailable).unwrap();
        assert_eq!(json, "\"oldDeviceUnavailable\"");
    }
}
