use std::path::Path;
use std::sync::Weak;

use crate::models::audio_models::{AudioFormat, PlaybackMode};
use crate::models::error::SessionError;
use crate::models::events::DeviceReconnectedReason;
use crate::traits::capture_provider::{AudioBufferCallback, InputRequest, InputStream, MeteredRecorder};
use crate::traits::output_graph::OutputGraph;

/// Hardware session category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCategory {
    Playback(PlaybackMode),
    PlayAndRecord,
}

/// Route change notification reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteChangeReason {
    NewDeviceAvailable,
    OldDeviceUnavailable,
    CategoryChange,
    Other,
}

impl RouteChangeReason {
    pub fn reconnected_reason(&self) -> DeviceReconnectedReason {
        match self {
            Self::NewDeviceAvailable => DeviceReconnectedReason::NewDeviceAvailable,
            Self::OldDeviceUnavailable => DeviceReconnectedReason::OldDeviceUnavailable,
            Self::CategoryChange | Self::Other => DeviceReconnectedReason::Unknown,
        }
    }
}

/// Interruption notifications (another process took audio focus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptionEvent {
    Began,
    Ended { should_resume: bool },
}

/// Receives asynchronous hardware notifications.
///
/// May be called from any thread.
pub trait HardwareObserver: Send + Sync {
    fn on_route_change(&self, reason: RouteChangeReason);

    fn on_interruption(&self, event: InterruptionEvent);
}

/// The process-wide hardware audio session.
///
/// Only the session state machine calls the category/activation methods.
/// Every method may block; none is called from a hardware callback.
pub trait AudioHardware: Send + Sync {
    fn set_category(&self, category: SessionCategory) -> Result<(), SessionError>;

    fn set_active(&self, active: bool) -> Result<(), SessionError>;

    /// Native input sample rate of the current route.
    fn hardware_sample_rate(&self) -> f64;

    /// Attach a player node and connect it to the mixer at `format`.
    fn build_output_graph(&self, format: AudioFormat) -> Result<Box<dyn OutputGraph>, SessionError>;

    /// Open an input stream that delivers buffers to `callback`.
    fn open_input(
        &self,
        request: InputRequest,
        callback: AudioBufferCallback,
    ) -> Result<Box<dyn InputStream>, SessionError>;

    /// Create a metering file recorder writing to `path` (extension decided by the backend).
    fn open_metered_recorder(&self, path: &Path) -> Result<Box<dyn MeteredRecorder>, SessionError>;

    /// Register the observer for route and interruption notifications.
    fn set_observer(&self, _observer: Weak<dyn HardwareObserver>) {}
}
