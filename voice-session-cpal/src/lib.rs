//! # voice-session-cpal
//!
//! Desktop backend for voice-session-core, built on cpal.
//!
//! Provides:
//! - `CpalHardware`: the `AudioHardware` implementation on the default host
//! - `CpalOutputGraph`: scheduled playback on the default output device
//! - `CpalInputStream`: streaming capture from the default input device
//! - `CpalMeteredRecorder`: 16-bit WAV recorder with level metering
//! - `DeviceMonitor`: default-device route change detection
//!
//! ## Usage
//! ```ignore
//! use voice_session_core::{AudioSessionEngine, EngineConfiguration};
//! use voice_session_cpal::CpalHardware;
//!
//! let engine = AudioSessionEngine::new(CpalHardware::new()?, EngineConfiguration::default())?;
//! let done = engine.play_chunk(&chunk_base64, "turn-1", Some("pcm_s16le"))?;
//! done.wait()?;
//! ```

pub mod device_monitor;
pub mod error;
pub mod hardware;
pub mod input;
pub mod output;
pub mod recorder;
mod stream_thread;

pub use device_monitor::{DeviceMonitor, RouteNotifier};
pub use error::CpalError;
pub use hardware::CpalHardware;
pub use input::CpalInputStream;
pub use output::CpalOutputGraph;
pub use recorder::CpalMeteredRecorder;
