use serde::Serialize;

/// Audio session state machine.
///
/// State transitions:
/// ```text
/// Idle ── first enqueue ──► PlaybackActive ── stop / pause / route change ──► Idle
/// Idle ── capture start ──► RecordingActive ↔ RecordingPaused ── capture stop ──► Idle
/// any ── interruption began ──► Interrupted
/// Interrupted ── ended, resume hint ──► state held before the interruption
/// Interrupted ── ended, no hint ──► PlaybackPaused ── next enqueue ──► PlaybackActive
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    PlaybackActive,
    PlaybackPaused,
    RecordingActive,
    RecordingPaused,
    Interrupted,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_playback(&self) -> bool {
        matches!(self, Self::PlaybackActive | Self::PlaybackPaused)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::RecordingActive | Self::RecordingPaused)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}
