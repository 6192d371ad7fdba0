//! Default-device route monitor.
//!
//! Polls the name of the default output device and relays stream
//! `DeviceNotAvailable` errors, reporting both to the registered observer
//! from the monitor thread.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use parking_lot::Mutex;

use voice_session_core::models::error::SessionError;
use voice_session_core::traits::audio_hardware::{HardwareObserver, RouteChangeReason};

enum MonitorEvent {
    Route(RouteChangeReason),
    Stop,
}

type ObserverSlot = Arc<Mutex<Option<Weak<dyn HardwareObserver>>>>;

/// Cloneable handle streams use to report device loss from their error callbacks.
#[derive(Clone)]
pub struct RouteNotifier {
    tx: mpsc::Sender<MonitorEvent>,
}

impl RouteNotifier {
    pub fn stream_error(&self, err: &cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                log::warn!("Audio device disappeared");
                let _ = self.tx.send(MonitorEvent::Route(RouteChangeReason::OldDeviceUnavailable));
            }
            other => log::error!("Audio stream error: {}", other),
        }
    }
}

pub struct DeviceMonitor {
    tx: mpsc::Sender<MonitorEvent>,
    observer: ObserverSlot,
    handle: Option<thread::JoinHandle<()>>,
}

impl DeviceMonitor {
    pub fn start(poll_interval: Duration) -> Result<Self, SessionError> {
        let (tx, rx) = mpsc::channel::<MonitorEvent>();
        let observer: ObserverSlot = Arc::new(Mutex::new(None));
        let thread_observer = Arc::clone(&observer);

        let handle = thread::Builder::new()
            .name("device-monitor".into())
            .spawn(move || monitor_loop(rx, thread_observer, poll_interval))
            .map_err(|e| SessionError::SessionUnavailable(format!("failed to spawn device monitor: {}", e)))?;

        Ok(Self {
            tx,
            observer,
            handle: Some(handle),
        })
    }

    pub fn notifier(&self) -> RouteNotifier {
        RouteNotifier { tx: self.tx.clone() }
    }

    pub fn set_observer(&self, observer: Weak<dyn HardwareObserver>) {
        *self.observer.lock() = Some(observer);
    }

    /// Stop polling. Does not join when called from the monitor thread itself.
    pub fn stop(&mut self) {
        let _ = self.tx.send(MonitorEvent::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Device monitor thread panicked");
            }
        }
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn default_output_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|device| device.name().ok())
}

/// Classify a change of default output device.
fn classify(previous: Option<&str>, current: Option<&str>) -> Option<RouteChangeReason> {
    match (previous, current) {
        (Some(a), Some(b)) if a == b => None,
        (None, None) => None,
        (_, Some(_)) => Some(RouteChangeReason::NewDeviceAvailable),
        (Some(_), None) => Some(RouteChangeReason::OldDeviceUnavailable),
    }
}

fn monitor_loop(rx: mpsc::Receiver<MonitorEvent>, observer: ObserverSlot, poll_interval: Duration) {
    let mut current = default_output_name();
    log::debug!("Device monitor started (default output: {:?})", current);

    loop {
        let reason = match rx.recv_timeout(poll_interval) {
            Ok(MonitorEvent::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(MonitorEvent::Route(reason)) => {
                current = default_output_name();
                Some(reason)
            }
            Err(RecvTimeoutError::Timeout) => {
                let polled = default_output_name();
                let reason = classify(current.as_deref(), polled.as_deref());
                if reason.is_some() {
                    log::info!("Default output changed: {:?} -> {:?}", current, polled);
                }
                current = polled;
                reason
            }
        };

        if let Some(reason) = reason {
            let target = observer.lock().as_ref().and_then(Weak::upgrade);
            if let Some(target) = target {
                target.on_route_change(reason);
            }
        }
    }
    log::debug!("Device monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_device_is_not_a_change() {
        assert_eq!(classify(Some("Speakers"), Some("Speakers")), None);
        assert_eq!(classify(None, None), None);
    }

    #[test]
    fn switching_devices_reports_new_device() {
        assert_eq!(
            classify(Some("Speakers"), Some("Headphones")),
            Some(RouteChangeReason::NewDeviceAvailable)
        );
        assert_eq!(classify(None, Some("Headphones")), Some(RouteChangeReason::NewDeviceAvailable));
    }

    #[test]
    fn losing_the_default_reports_old_device() {
        assert_eq!(classify(Some("Headphones"), None), Some(RouteChangeReason::OldDeviceUnavailable));
    }
}
