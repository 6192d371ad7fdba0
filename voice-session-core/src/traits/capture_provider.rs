use std::path::Path;
use std::sync::Arc;

use crate::models::audio_models::{AudioFormat, ContainerKind};
use crate::models::error::SessionError;
use crate::models::recording_settings::EncoderQuality;

/// One buffer delivered by a hardware input stream.
#[derive(Debug, Clone, Copy)]
pub struct CapturedBuffer<'a> {
    /// Interleaved f32 samples.
    pub samples: &'a [f32],
    pub sample_rate: f64,
    pub channels: u16,
    /// Average power measured by the hardware, if it provides one.
    pub reported_power_db: Option<f32>,
}

/// Callback invoked for every captured buffer.
///
/// Backends must not call this from a real-time audio thread.
pub type AudioBufferCallback = Arc<dyn Fn(CapturedBuffer<'_>) + Send + Sync + 'static>;

/// What a streaming capture asks the hardware for.
///
/// `None` fields mean "hardware default".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputRequest {
    pub sample_rate: Option<f64>,
    pub channels: Option<u16>,
}

/// An open hardware input stream. Dropping it releases the device.
pub trait InputStream: Send {
    /// The format buffers are actually delivered in.
    fn format(&self) -> AudioFormat;

    /// Stop delivering buffers and release the device.
    fn stop(&mut self);
}

/// Format a metered recorder writes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderSettings {
    pub container: ContainerKind,
    pub sample_rate: Option<f64>,
    pub channels: Option<u16>,
    /// Known exactly for PCM containers.
    pub bit_depth: Option<u16>,
    /// Encoder quality for lossy containers.
    pub quality: Option<EncoderQuality>,
}

/// File recorder with built-in level metering.
pub trait MeteredRecorder: Send {
    /// Begin or resume writing to the file.
    fn record(&mut self) -> Result<(), SessionError>;

    /// Stop writing without releasing the input.
    fn pause(&mut self);

    /// Finalize the file and release the input.
    fn stop(&mut self) -> Result<(), SessionError>;

    fn is_recording(&self) -> bool;

    /// Current average power in dBFS, `-160.0` for silence.
    fn average_power(&self) -> f32;

    fn settings(&self) -> RecorderSettings;

    fn file_path(&self) -> &Path;
}
