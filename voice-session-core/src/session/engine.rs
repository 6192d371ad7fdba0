use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::capture::microphone::MicrophoneEngine;
use crate::models::audio_models::{AudioBuffer, SoundConfig};
use crate::models::config::EngineConfiguration;
use crate::models::error::SessionError;
use crate::models::recording_result::{RecordingResult, StartResult};
use crate::models::recording_settings::RecordingSettings;
use crate::models::state::SessionState;
use crate::playback::completion::{completion_pair, CompletionHandle};
use crate::playback::queue::PlaybackQueue;
use crate::playback::scheduler::{Scheduler, SchedulerSignal};
use crate::processing::{decoder, levels};
use crate::session::state_machine::StateMachine;
use crate::storage::files;
use crate::traits::audio_hardware::{AudioHardware, HardwareObserver, InterruptionEvent, RouteChangeReason};
use crate::traits::event_sink::{EventSink, SinkSlot};

/// Shared engine internals. Registered with the hardware as its observer.
struct EngineCore {
    machine: Arc<StateMachine>,
    queue: Arc<PlaybackQueue>,
    signal: Arc<SchedulerSignal>,
    microphone: MicrophoneEngine,
}

impl HardwareObserver for EngineCore {
    fn on_route_change(&self, reason: RouteChangeReason) {
        self.machine.handle_route_change(reason);
    }

    fn on_interruption(&self, event: InterruptionEvent) {
        self.machine.handle_interruption(event);
    }
}

/// Caller-facing voice session engine.
///
/// Generic over the hardware backend via the `AudioHardware` trait.
/// Ties together decoding, the playback queue and scheduler, the session
/// state machine and microphone capture:
/// ```text
/// play_chunk → [Decoder] → [PlaybackQueue] → [Scheduler] → [StateMachine: OutputGraph] → hardware
/// start_*    → [MicrophoneEngine] → [StateMachine: category] → hardware input → [EventSink]
/// route / interruption notifications → [StateMachine]
/// ```
/// Every method returns without waiting for audio; playback completion is
/// reported through the returned `CompletionHandle`.
pub struct AudioSessionEngine<H: AudioHardware + 'static> {
    hardware: Arc<H>,
    config: EngineConfiguration,
    core: Arc<EngineCore>,
    sinks: Arc<SinkSlot>,
    scheduler: Mutex<Option<Scheduler>>,
    destroyed: AtomicBool,
}

impl<H: AudioHardware + 'static> AudioSessionEngine<H> {
    pub fn new(hardware: H, config: EngineConfiguration) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfiguration)?;

        let hardware = Arc::new(hardware);
        let shared_hardware: Arc<dyn AudioHardware> = hardware.clone();
        let sinks = Arc::new(SinkSlot::new());
        let signal = Arc::new(SchedulerSignal::new());
        let queue = Arc::new(PlaybackQueue::new());
        let machine = Arc::new(StateMachine::new(
            shared_hardware,
            config.sound,
            Arc::clone(&signal),
            Arc::clone(&sinks),
        ));
        let microphone = MicrophoneEngine::new(
            Arc::clone(&machine),
            Arc::clone(&sinks),
            config.recordings_directory.clone(),
            config.default_metering_interval_ms,
        );

        let scheduler = Scheduler::start(
            Arc::clone(&machine),
            Arc::clone(&queue),
            Arc::clone(&signal),
            Arc::clone(&sinks),
            config.scheduler_backoff(),
        )?;

        let core = Arc::new(EngineCore {
            machine,
            queue,
            signal,
            microphone,
        });
        let observer: Weak<dyn HardwareObserver> = Arc::downgrade(&core) as Weak<dyn HardwareObserver>;
        hardware.set_observer(observer);

        log::info!(
            "Voice session engine ready: {} Hz, {} ch, recordings in {}",
            config.sound.sample_rate,
            config.sound.channels,
            config.recordings_directory.display()
        );

        Ok(Self {
            hardware,
            config,
            core,
            sinks,
            scheduler: Mutex::new(Some(scheduler)),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn configuration(&self) -> &EngineConfiguration {
        &self.config
    }

    /// Register the single event sink, replacing any previous one.
    pub fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        self.sinks.set(sink);
    }

    pub fn state(&self) -> SessionState {
        self.core.machine.state()
    }

    pub fn sound_config(&self) -> SoundConfig {
        self.core.machine.sound_config()
    }

    /// Entries waiting in the queue (the in-flight buffer excluded).
    pub fn queued_len(&self) -> usize {
        self.core.queue.len()
    }

    /// Output graphs built since the engine was created.
    pub fn graph_builds(&self) -> u64 {
        self.core.machine.graph_builds()
    }

    /// Map a dBFS level onto `[0, 1]` using the configured floor.
    pub fn normalized_level(&self, dbfs: f32) -> f32 {
        levels::normalize_level(dbfs, self.config.level_floor_db)
    }

    // --- Playback ---

    /// Decode a base64 PCM chunk at the playback format and queue it.
    ///
    /// `encoding` is `pcm_s16le` or `pcm_f32le`; `None` means `pcm_s16le`.
    pub fn play_chunk(
        &self,
        base64_audio: &str,
        turn_id: &str,
        encoding: Option<&str>,
    ) -> Result<CompletionHandle, SessionError> {
        self.ensure_alive()?;
        let format = self.core.machine.sound_config().format();
        let buffer = decoder::decode_chunk(base64_audio, encoding, format)?;
        Ok(self.enqueue(buffer, turn_id))
    }

    /// Decode a base64 WAV or M4A file and queue it.
    pub fn play_container(&self, base64_audio: &str, turn_id: &str) -> Result<CompletionHandle, SessionError> {
        self.ensure_alive()?;
        let buffer = decoder::decode_container(base64_audio)?;
        Ok(self.enqueue(buffer, turn_id))
    }

    /// Decode a WAV or M4A file from disk and queue it.
    pub fn play_container_file(&self, path: &Path, turn_id: &str) -> Result<CompletionHandle, SessionError> {
        self.ensure_alive()?;
        let bytes = fs::read(path)
            .map_err(|e| SessionError::FileIoFailure(format!("failed to read {}: {}", path.display(), e)))?;
        let buffer = decoder::decode_container_bytes(bytes)?;
        log::debug!(
            "Queued {} ({} frames) for turn '{}'",
            path.display(),
            buffer.frame_count(),
            turn_id
        );
        Ok(self.enqueue(buffer, turn_id))
    }

    /// Queue an already decoded buffer. Empty buffers resolve immediately.
    pub fn enqueue(&self, buffer: AudioBuffer, turn_id: &str) -> CompletionHandle {
        if buffer.is_empty() {
            let (token, handle) = completion_pair();
            token.played();
            return handle;
        }
        let handle = self.core.queue.push(buffer, turn_id);
        self.core.signal.release();
        handle
    }

    /// Halt playback and tear down the graph. Queued entries stay and play
    /// after the next enqueue; the buffer that was playing is dropped.
    pub fn pause_playback(&self) -> Result<(), SessionError> {
        self.ensure_alive()?;
        self.core.machine.stop_playback(true);
        Ok(())
    }

    /// Cancel everything queued and halt playback.
    pub fn stop_playback(&self) -> Result<(), SessionError> {
        self.ensure_alive()?;
        let cancelled = self.core.queue.clear_all();
        self.core.machine.stop_playback(false);
        log::debug!("Playback stopped, {} queued chunk(s) cancelled", cancelled);
        Ok(())
    }

    /// Cancel the queued entries of one turn. Returns how many were removed.
    pub fn clear_queue(&self, turn_id: &str) -> Result<usize, SessionError> {
        self.ensure_alive()?;
        let cancelled = self.core.queue.clear_turn(turn_id);
        log::debug!("Cleared {} queued chunk(s) of turn '{}'", cancelled, turn_id);
        Ok(cancelled)
    }

    /// Change the playback format. Pending entries are cancelled.
    pub fn set_sound_config(&self, config: SoundConfig) -> Result<(), SessionError> {
        self.ensure_alive()?;
        config.validate().map_err(SessionError::InvalidConfiguration)?;
        self.core.queue.clear_all();
        self.core.machine.set_sound_config(config)
    }

    pub fn reset_sound_config(&self) -> Result<(), SessionError> {
        self.set_sound_config(SoundConfig::default())
    }

    // --- Capture ---

    pub fn start_recording(&self, interval_ms: Option<u64>) -> Result<StartResult, SessionError> {
        self.ensure_alive()?;
        self.core.microphone.start_recording(interval_ms)
    }

    pub fn pause_recording(&self) -> Result<(), SessionError> {
        self.core.microphone.pause_recording()
    }

    pub fn resume_recording(&self) -> Result<(), SessionError> {
        self.core.microphone.resume_recording()
    }

    pub fn stop_recording(&self) -> Result<RecordingResult, SessionError> {
        self.core.microphone.stop_recording()
    }

    pub fn start_microphone_stream(
        &self,
        settings: RecordingSettings,
        interval_ms: Option<u64>,
    ) -> Result<StartResult, SessionError> {
        self.ensure_alive()?;
        self.core.microphone.start_microphone_stream(settings, interval_ms)
    }

    pub fn stop_microphone_stream(&self) -> Result<Option<RecordingResult>, SessionError> {
        self.core.microphone.stop_microphone_stream()
    }

    /// Flip silence for streamed chunks. Returns the new state.
    pub fn toggle_silence(&self) -> bool {
        self.core.microphone.toggle_silence()
    }

    pub fn is_silenced(&self) -> bool {
        self.core.microphone.is_silenced()
    }

    // --- Recordings on disk ---

    pub fn list_recordings(&self) -> Result<Vec<PathBuf>, SessionError> {
        files::list_recordings(&self.config.recordings_directory)
    }

    pub fn delete_recording(&self, path: &Path) -> Result<(), SessionError> {
        files::delete_recording(path)
    }

    pub fn clear_recordings(&self) -> Result<usize, SessionError> {
        files::clear_recordings(&self.config.recordings_directory)
    }

    // --- Hardware notifications ---

    pub fn handle_route_change(&self, reason: RouteChangeReason) {
        self.core.machine.handle_route_change(reason);
    }

    pub fn handle_interruption(&self, event: InterruptionEvent) {
        self.core.machine.handle_interruption(event);
    }

    /// Stop capture and playback, tear down the graph, deactivate the
    /// session and stop the scheduler. Later calls fail with `SessionUnavailable`.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.microphone.shutdown();
        self.core.queue.clear_all();
        if let Some(mut scheduler) = self.scheduler.lock().take() {
            scheduler.stop();
        }
        self.core.machine.shutdown();
        self.core.queue.clear_all();
        log::info!("Voice session engine destroyed");
    }

    fn ensure_alive(&self) -> Result<(), SessionError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(SessionError::SessionUnavailable("engine has been destroyed".into()));
        }
        Ok(())
    }
}

impl<H: AudioHardware + 'static> Drop for AudioSessionEngine<H> {
    fn drop(&mut self) {
        self.destroy();
    }
}
