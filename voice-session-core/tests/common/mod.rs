#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;

use voice_session_core::{
    AudioBuffer, AudioBufferCallback, AudioDataEvent, AudioFormat, AudioHardware, AudioSessionEngine, CapturedBuffer,
    ChunkPlayedEvent, CompletionCallback, ContainerKind, DeviceReconnectedReason, EncoderQuality, EngineConfiguration, EventSink,
    HardwareObserver, InputRequest, InputStream, InterruptionEvent, MeteredRecorder, OutputGraph, RecorderSettings,
    RouteChangeReason, SessionCategory, SessionError, SessionState,
};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Base64 `pcm_f32le` chunk whose first sample is `marker`.
pub fn f32_chunk(marker: f32, frames: usize) -> String {
    let mut bytes = Vec::with_capacity(frames * 4);
    bytes.extend_from_slice(&marker.to_le_bytes());
    for _ in 1..frames {
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Base64 `pcm_s16le` chunk of `frames` samples at `value`.
pub fn s16_chunk(value: i16, frames: usize) -> String {
    let bytes: Vec<u8> = (0..frames).flat_map(|_| value.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Everything the scripted hardware has seen, shared with its graphs and streams.
pub struct MockShared {
    pub categories: Mutex<Vec<SessionCategory>>,
    pub active: AtomicBool,
    pub fail_activation: AtomicBool,
    pub fail_graph_build: AtomicBool,
    pub graph_builds: AtomicUsize,
    pub live_graphs: AtomicUsize,
    /// First sample of every buffer handed to a graph, in schedule order.
    pub scheduled: Mutex<Vec<f32>>,
    pub scheduled_formats: Mutex<Vec<AudioFormat>>,
    /// Completion callbacks of the live graph, oldest first.
    pending: Mutex<VecDeque<CompletionCallback>>,
    input: Mutex<Option<AudioBufferCallback>>,
    pub input_format: Mutex<AudioFormat>,
    pub recorder_power: Mutex<f32>,
    /// Container the next metered recorder writes. M4a recorders report a
    /// quality instead of a bit depth.
    pub recorder_container: Mutex<ContainerKind>,
    pub recorder_quality: Mutex<EncoderQuality>,
    pub recorders_opened: AtomicU64,
    observer: Mutex<Option<Weak<dyn HardwareObserver>>>,
}

impl MockShared {
    fn new() -> Self {
        Self {
            categories: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            fail_activation: AtomicBool::new(false),
            fail_graph_build: AtomicBool::new(false),
            graph_builds: AtomicUsize::new(0),
            live_graphs: AtomicUsize::new(0),
            scheduled: Mutex::new(Vec::new()),
            scheduled_formats: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            input: Mutex::new(None),
            input_format: Mutex::new(AudioFormat::new(48000.0, 1)),
            recorder_power: Mutex::new(-30.0),
            recorder_container: Mutex::new(ContainerKind::Wav),
            recorder_quality: Mutex::new(EncoderQuality::High),
            recorders_opened: AtomicU64::new(0),
            observer: Mutex::new(None),
        }
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Render the oldest scheduled buffer. Returns false if nothing is scheduled.
    pub fn complete_next(&self) -> bool {
        let callback = self.pending.lock().pop_front();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Deliver one captured buffer to the open input stream.
    pub fn push_input(&self, samples: &[f32]) -> bool {
        let callback = self.input.lock().clone();
        let format = *self.input_format.lock();
        match callback {
            Some(callback) => {
                callback(CapturedBuffer {
                    samples,
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                    reported_power_db: None,
                });
                true
            }
            None => false,
        }
    }

    pub fn has_input(&self) -> bool {
        self.input.lock().is_some()
    }

    pub fn fire_route_change(&self, reason: RouteChangeReason) {
        let observer = self.observer.lock().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.on_route_change(reason);
        }
    }

    pub fn fire_interruption(&self, event: InterruptionEvent) {
        let observer = self.observer.lock().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.on_interruption(event);
        }
    }
}

/// Scripted in-memory `AudioHardware`.
pub struct MockHardware {
    pub shared: Arc<MockShared>,
}

impl MockHardware {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared::new()),
        }
    }
}

impl AudioHardware for MockHardware {
    fn set_category(&self, category: SessionCategory) -> Result<(), SessionError> {
        self.shared.categories.lock().push(category);
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<(), SessionError> {
        if active && self.shared.fail_activation.load(Ordering::SeqCst) {
            return Err(SessionError::SessionUnavailable("activation refused".into()));
        }
        self.shared.active.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn hardware_sample_rate(&self) -> f64 {
        self.shared.input_format.lock().sample_rate
    }

    fn build_output_graph(&self, format: AudioFormat) -> Result<Box<dyn OutputGraph>, SessionError> {
        if self.shared.fail_graph_build.load(Ordering::SeqCst) {
            return Err(SessionError::GraphBuildFailure("no output device".into()));
        }
        self.shared.graph_builds.fetch_add(1, Ordering::SeqCst);
        self.shared.live_graphs.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockGraph {
            shared: Arc::clone(&self.shared),
            format,
            engine_running: false,
            playing: false,
            torn_down: false,
        }))
    }

    fn open_input(
        &self,
        _request: InputRequest,
        callback: AudioBufferCallback,
    ) -> Result<Box<dyn InputStream>, SessionError> {
        *self.shared.input.lock() = Some(callback);
        Ok(Box::new(MockInput {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn open_metered_recorder(&self, path: &Path) -> Result<Box<dyn MeteredRecorder>, SessionError> {
        self.shared.recorders_opened.fetch_add(1, Ordering::SeqCst);
        let container = *self.shared.recorder_container.lock();
        Ok(Box::new(MockRecorder {
            shared: Arc::clone(&self.shared),
            path: path.with_extension(container.extension()),
            container,
            quality: *self.shared.recorder_quality.lock(),
            recording: false,
            samples_written: 0,
        }))
    }

    fn set_observer(&self, observer: Weak<dyn HardwareObserver>) {
        *self.shared.observer.lock() = Some(observer);
    }
}

struct MockGraph {
    shared: Arc<MockShared>,
    format: AudioFormat,
    engine_running: bool,
    playing: bool,
    torn_down: bool,
}

impl OutputGraph for MockGraph {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn is_engine_running(&self) -> bool {
        self.engine_running
    }

    fn start_engine(&mut self) -> Result<(), SessionError> {
        self.engine_running = true;
        Ok(())
    }

    fn stop_engine(&mut self) {
        self.engine_running = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn play(&mut self) -> Result<(), SessionError> {
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing = false;
        self.shared.pending.lock().clear();
    }

    fn schedule(&mut self, buffer: AudioBuffer, on_complete: CompletionCallback) -> Result<(), SessionError> {
        self.shared
            .scheduled
            .lock()
            .push(buffer.samples().first().copied().unwrap_or_default());
        self.shared.scheduled_formats.lock().push(buffer.format());
        self.shared.pending.lock().push_back(on_complete);
        Ok(())
    }

    fn teardown(&mut self) {
        if !self.torn_down {
            self.torn_down = true;
            self.shared.live_graphs.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct MockInput {
    shared: Arc<MockShared>,
}

impl InputStream for MockInput {
    fn format(&self) -> AudioFormat {
        *self.shared.input_format.lock()
    }

    fn stop(&mut self) {
        self.shared.input.lock().take();
    }
}

struct MockRecorder {
    shared: Arc<MockShared>,
    path: PathBuf,
    container: ContainerKind,
    quality: EncoderQuality,
    recording: bool,
    samples_written: usize,
}

impl MeteredRecorder for MockRecorder {
    fn record(&mut self) -> Result<(), SessionError> {
        self.recording = true;
        self.samples_written += 160;
        Ok(())
    }

    fn pause(&mut self) {
        self.recording = false;
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.recording = false;
        std::fs::write(&self.path, vec![0u8; 44 + self.samples_written * 2])?;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn average_power(&self) -> f32 {
        *self.shared.recorder_power.lock()
    }

    fn settings(&self) -> RecorderSettings {
        match self.container {
            ContainerKind::Wav => RecorderSettings {
                container: ContainerKind::Wav,
                sample_rate: Some(44100.0),
                channels: Some(1),
                bit_depth: Some(16),
                quality: None,
            },
            ContainerKind::M4a => RecorderSettings {
                container: ContainerKind::M4a,
                sample_rate: Some(44100.0),
                channels: Some(1),
                bit_depth: None,
                quality: Some(self.quality),
            },
        }
    }

    fn file_path(&self) -> &Path {
        &self.path
    }
}

/// Everything the engine reported, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    AudioData(AudioDataEvent),
    ChunkPlayed(ChunkPlayedEvent),
    DeviceReconnected(DeviceReconnectedReason),
    SoundStarted,
    StateChanged(SessionState),
}

#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<SinkEvent>>,
}

impl CollectingSink {
    pub fn snapshot(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn chunk_played(&self) -> Vec<ChunkPlayedEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::ChunkPlayed(event) => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn audio_data(&self) -> Vec<AudioDataEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::AudioData(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reconnects(&self) -> Vec<DeviceReconnectedReason> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::DeviceReconnected(reason) => Some(*reason),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &SinkEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }
}

impl EventSink for CollectingSink {
    fn on_audio_data(&self, event: &AudioDataEvent) {
        self.events.lock().push(SinkEvent::AudioData(event.clone()));
    }

    fn on_chunk_played(&self, event: &ChunkPlayedEvent) {
        self.events.lock().push(SinkEvent::ChunkPlayed(*event));
    }

    fn on_device_reconnected(&self, reason: DeviceReconnectedReason) {
        self.events.lock().push(SinkEvent::DeviceReconnected(reason));
    }

    fn on_sound_started(&self) {
        self.events.lock().push(SinkEvent::SoundStarted);
    }

    fn on_state_changed(&self, state: SessionState) {
        self.events.lock().push(SinkEvent::StateChanged(state));
    }
}

pub struct Harness {
    pub engine: AudioSessionEngine<MockHardware>,
    pub hw: Arc<MockShared>,
    pub sink: Arc<CollectingSink>,
    pub dir: tempfile::TempDir,
}

pub fn harness() -> Harness {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfiguration {
        recordings_directory: dir.path().join("recordings"),
        scheduler_backoff_ms: 5,
        default_metering_interval_ms: 100,
        ..Default::default()
    };
    let hardware = MockHardware::new();
    let hw = Arc::clone(&hardware.shared);
    let engine = AudioSessionEngine::new(hardware, config).unwrap();
    let sink = Arc::new(CollectingSink::default());
    engine.set_event_sink(Some(sink.clone()));
    Harness { engine, hw, sink, dir }
}
