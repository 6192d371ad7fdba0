//! # voice-session-core
//!
//! Platform-agnostic audio session engine for interactive voice apps.
//!
//! Plays synthesized speech chunks gaplessly with turn-scoped cancellation,
//! captures the microphone in metering or streaming mode, and keeps the
//! single hardware session consistent across route changes and
//! interruptions. Platform backends implement the `AudioHardware` trait
//! and plug into the generic `AudioSessionEngine`.
//!
//! ## Architecture
//!
//! ```text
//! voice-session-core (this crate)
//! ├── traits/       ← AudioHardware, OutputGraph, InputStream, MeteredRecorder, EventSink
//! ├── models/       ← SessionError, SessionState, SoundConfig, EngineConfiguration, events
//! ├── processing/   ← chunk/container decoding, levels, resampling, WAV headers
//! ├── playback/     ← completion tokens, PlaybackQueue, Scheduler
//! ├── session/      ← StateMachine, AudioSessionEngine (generic facade)
//! ├── capture/      ← MicrophoneEngine, streaming pipeline, recording clock
//! └── storage/      ← PCM/WAV writer, metadata sidecars, result builder, file listing
//! ```

pub mod capture;
pub mod models;
pub mod playback;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioBuffer, AudioFormat, BufferSource, ContainerKind, PlaybackMode, SampleEncoding, SoundConfig};
pub use models::config::EngineConfiguration;
pub use models::error::SessionError;
pub use models::events::{AudioDataEvent, AudioDataMode, ChunkPlayedEvent, DeviceReconnectedReason, SUSPEND_SOUND_EVENTS_TURN_ID};
pub use models::recording_result::{RecordingMetadata, RecordingResult, StartResult};
pub use models::recording_settings::{CaptureMode, EncoderQuality, RecordingSettings};
pub use models::state::SessionState;
pub use playback::completion::{CompletionHandle, PlaybackOutcome, PlaybackResult};
pub use session::engine::AudioSessionEngine;
pub use storage::pcm_writer::PcmFileWriter;
pub use traits::audio_hardware::{AudioHardware, HardwareObserver, InterruptionEvent, RouteChangeReason, SessionCategory};
pub use traits::capture_provider::{AudioBufferCallback, CapturedBuffer, InputRequest, InputStream, MeteredRecorder, RecorderSettings};
pub use traits::event_sink::EventSink;
pub use traits::output_graph::{CompletionCallback, OutputGraph};
