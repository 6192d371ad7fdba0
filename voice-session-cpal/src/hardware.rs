use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use parking_lot::Mutex;

use voice_session_core::models::audio_models::{AudioFormat, PlaybackMode};
use voice_session_core::models::error::SessionError;
use voice_session_core::traits::audio_hardware::{AudioHardware, HardwareObserver, SessionCategory};
use voice_session_core::traits::capture_provider::{
    AudioBufferCallback, InputRequest, InputStream, MeteredRecorder,
};
use voice_session_core::traits::output_graph::OutputGraph;

use crate::device_monitor::DeviceMonitor;
use crate::input::CpalInputStream;
use crate::output::CpalOutputGraph;
use crate::recorder::CpalMeteredRecorder;

/// Default-device poll interval of the route monitor.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Rate reported when no input device can be queried.
const FALLBACK_SAMPLE_RATE: f64 = 48000.0;

/// Desktop `AudioHardware` on the cpal default host.
///
/// Desktop hosts have no session categories; the category only decides
/// which default device activation requires.
pub struct CpalHardware {
    category: Mutex<Option<SessionCategory>>,
    active: AtomicBool,
    monitor: DeviceMonitor,
}

impl CpalHardware {
    pub fn new() -> Result<Self, SessionError> {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Result<Self, SessionError> {
        let host = cpal::default_host();
        log::info!("Using audio host {:?}", host.id());
        Ok(Self {
            category: Mutex::new(None),
            active: AtomicBool::new(false),
            monitor: DeviceMonitor::start(poll_interval)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn category(&self) -> Option<SessionCategory> {
        *self.category.lock()
    }
}

impl AudioHardware for CpalHardware {
    fn set_category(&self, category: SessionCategory) -> Result<(), SessionError> {
        if let SessionCategory::Playback(mode) = category {
            if mode != PlaybackMode::Regular {
                log::debug!("{:?} playback is not available on this host, using regular output", mode);
            }
        }
        *self.category.lock() = Some(category);
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<(), SessionError> {
        if active {
            let host = cpal::default_host();
            match *self.category.lock() {
                Some(SessionCategory::PlayAndRecord) => {
                    if host.default_input_device().is_none() {
                        return Err(SessionError::SessionUnavailable("no default input device".into()));
                    }
                }
                _ => {
                    if host.default_output_device().is_none() {
                        return Err(SessionError::SessionUnavailable("no default output device".into()));
                    }
                }
            }
        }
        if self.active.swap(active, Ordering::SeqCst) != active {
            log::debug!("Audio session {}", if active { "activated" } else { "deactivated" });
        }
        Ok(())
    }

    fn hardware_sample_rate(&self) -> f64 {
        cpal::default_host()
            .default_input_device()
            .and_then(|device| device.default_input_config().ok())
            .map(|config| config.sample_rate().0 as f64)
            .unwrap_or(FALLBACK_SAMPLE_RATE)
    }

    fn build_output_graph(&self, format: AudioFormat) -> Result<Box<dyn OutputGraph>, SessionError> {
        Ok(Box::new(CpalOutputGraph::new(format, self.monitor.notifier())?))
    }

    fn open_input(
        &self,
        request: InputRequest,
        callback: AudioBufferCallback,
    ) -> Result<Box<dyn InputStream>, SessionError> {
        Ok(Box::new(CpalInputStream::open(request, callback, self.monitor.notifier())?))
    }

    fn open_metered_recorder(&self, path: &Path) -> Result<Box<dyn MeteredRecorder>, SessionError> {
        Ok(Box::new(CpalMeteredRecorder::new(path, self.monitor.notifier())))
    }

    fn set_observer(&self, observer: Weak<dyn HardwareObserver>) {
        self.monitor.set_observer(observer);
    }
}
