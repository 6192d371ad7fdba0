use thiserror::Error;

use voice_session_core::models::error::SessionError;

/// Failures inside the cpal backend, mapped to `SessionError` at the trait boundary.
#[derive(Debug, Error)]
pub enum CpalError {
    #[error("no default {0} device")]
    NoDevice(&'static str),

    #[error("failed to query device config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to list device configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported device sample format: {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),

    #[error("audio thread failed: {0}")]
    Thread(String),
}

impl From<CpalError> for SessionError {
    fn from(e: CpalError) -> Self {
        match e {
            CpalError::UnsupportedSampleFormat(_) => SessionError::UnsupportedFormat(e.to_string()),
            _ => SessionError::SessionUnavailable(e.to_string()),
        }
    }
}
