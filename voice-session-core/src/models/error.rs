use thiserror::Error;

/// Errors surfaced by the voice session engine.
///
/// Cancellation is never an error: entries removed by `clear_queue` or
/// `stop_playback` resolve with `PlaybackOutcome::Cancelled`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("audio session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("output graph build failed: {0}")]
    GraphBuildFailure(String),

    #[error("not active: {0}")]
    NotActive(String),

    #[error("already active: {0}")]
    AlreadyActive(String),

    #[error("decode failed: {0}")]
    DecodeFailure(String),

    #[error("file i/o failed: {0}")]
    FileIoFailure(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SessionError {
    /// Stable machine-readable code, suitable for a bridge layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "ERR_UNSUPPORTED_FORMAT",
            Self::SessionUnavailable(_) => "ERR_SESSION_UNAVAILABLE",
            Self::GraphBuildFailure(_) => "ERR_GRAPH_BUILD",
            Self::NotActive(_) => "ERR_NOT_ACTIVE",
            Self::AlreadyActive(_) => "ERR_ALREADY_ACTIVE",
            Self::DecodeFailure(_) => "ERR_DECODE_AUDIO",
            Self::FileIoFailure(_) => "ERR_FILE_IO",
            Self::InvalidConfiguration(_) => "ERR_INVALID_CONFIG",
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::FileIoFailure(e.to_string())
    }
}
