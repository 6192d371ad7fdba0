use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::capture::clock::RecordingClock;
use crate::capture::stream_pipeline::StreamPipeline;
use crate::models::audio_models::{AudioFormat, ContainerKind};
use crate::models::config::MIN_METERING_INTERVAL_MS;
use crate::models::error::SessionError;
use crate::models::events::AudioDataEvent;
use crate::models::recording_result::{file_uri, RecordingMetadata, RecordingResult, StartResult};
use crate::models::recording_settings::{CaptureMode, RecordingSettings};
use crate::processing::levels::SILENCE_DBFS;
use crate::session::state_machine::StateMachine;
use crate::storage::metadata::write_metadata;
use crate::storage::result_builder::{build_result, reported_bit_depth};
use crate::traits::capture_provider::{
    AudioBufferCallback, CapturedBuffer, InputRequest, InputStream, MeteredRecorder, RecorderSettings,
};
use crate::traits::event_sink::SinkSlot;

/// Periodic level poller for metering captures.
struct MeteringTimer {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MeteringTimer {
    fn start(
        recorder: Arc<Mutex<Box<dyn MeteredRecorder>>>,
        sinks: Arc<SinkSlot>,
        file_uri: String,
        interval: Duration,
    ) -> Result<Self, SessionError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("metering-timer".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let level = {
                    let recorder = recorder.lock();
                    if !recorder.is_recording() {
                        continue;
                    }
                    recorder.average_power().clamp(SILENCE_DBFS, 0.0)
                };
                let event = AudioDataEvent::recording(file_uri.clone(), level);
                sinks.emit(|s| s.on_audio_data(&event));
            })
            .map_err(|e| SessionError::SessionUnavailable(format!("failed to spawn metering timer: {}", e)))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Metering timer thread panicked");
            }
        }
    }
}

impl Drop for MeteringTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct MeteringCapture {
    id: String,
    recorder: Arc<Mutex<Box<dyn MeteredRecorder>>>,
    clock: RecordingClock,
    timer: MeteringTimer,
}

struct StreamingCapture {
    stream: Box<dyn InputStream>,
    pipeline: Arc<Mutex<StreamPipeline>>,
}

enum ActiveCapture {
    Metering(MeteringCapture),
    Streaming(StreamingCapture),
}

/// Owns the hardware input in one of two modes.
///
/// Metering mode records a file at hardware defaults and a timer polls its
/// level. Streaming mode forwards converted PCM chunks and a level at the
/// buffer cadence. Only one capture runs at a time; both switch the session
/// category through the state machine.
pub struct MicrophoneEngine {
    machine: Arc<StateMachine>,
    sinks: Arc<SinkSlot>,
    recordings_directory: PathBuf,
    default_interval_ms: u64,
    capture: Mutex<Option<ActiveCapture>>,
    silenced: Arc<AtomicBool>,
}

impl MicrophoneEngine {
    pub fn new(
        machine: Arc<StateMachine>,
        sinks: Arc<SinkSlot>,
        recordings_directory: PathBuf,
        default_interval_ms: u64,
    ) -> Self {
        Self {
            machine,
            sinks,
            recordings_directory,
            default_interval_ms,
            capture: Mutex::new(None),
            silenced: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.capture.lock().is_some()
    }

    pub fn active_mode(&self) -> Option<CaptureMode> {
        self.capture.lock().as_ref().map(|c| match c {
            ActiveCapture::Metering(_) => CaptureMode::Metering,
            ActiveCapture::Streaming(_) => CaptureMode::Streaming,
        })
    }

    /// Start a metering capture. The timer polls at `interval_ms` (minimum 100 ms).
    pub fn start_recording(&self, interval_ms: Option<u64>) -> Result<StartResult, SessionError> {
        let mut capture = self.capture.lock();
        if capture.is_some() {
            return Err(SessionError::AlreadyActive("a capture is already running".into()));
        }

        let interval = Duration::from_millis(
            interval_ms
                .unwrap_or(self.default_interval_ms)
                .max(MIN_METERING_INTERVAL_MS),
        );

        self.machine.begin_recording()?;
        let started = self.open_recorder();
        let (id, recorder) = match started {
            Ok(opened) => opened,
            Err(e) => {
                self.machine.end_recording();
                return Err(e);
            }
        };

        let (settings, uri) = {
            let recorder = recorder.lock();
            (recorder.settings(), file_uri(recorder.file_path()))
        };

        let timer = match MeteringTimer::start(Arc::clone(&recorder), Arc::clone(&self.sinks), uri.clone(), interval) {
            Ok(timer) => timer,
            Err(e) => {
                if let Err(stop_err) = recorder.lock().stop() {
                    log::warn!("Failed to stop recorder: {}", stop_err);
                }
                self.machine.end_recording();
                return Err(e);
            }
        };

        log::info!("Metering capture {} started ({:?} interval)", id, interval);
        let result = StartResult {
            mode: CaptureMode::Metering,
            file_uri: uri,
            mime_type: settings.container.mime_type().to_string(),
            sample_rate: settings
                .sample_rate
                .unwrap_or_else(|| self.machine.hardware().hardware_sample_rate()),
            channels: settings.channels,
            bit_depth: reported_bit_depth(&settings),
        };

        *capture = Some(ActiveCapture::Metering(MeteringCapture {
            id,
            recorder,
            clock: RecordingClock::start(),
            timer,
        }));
        Ok(result)
    }

    /// Pause a metering capture without releasing the input.
    pub fn pause_recording(&self) -> Result<(), SessionError> {
        let mut capture = self.capture.lock();
        let metering = metering_capture(&mut capture)?;
        if metering.clock.is_paused() {
            return Ok(());
        }
        metering.recorder.lock().pause();
        metering.clock.pause();
        self.machine.set_recording_paused(true)?;
        log::info!("Metering capture {} paused", metering.id);
        Ok(())
    }

    pub fn resume_recording(&self) -> Result<(), SessionError> {
        let mut capture = self.capture.lock();
        let metering = metering_capture(&mut capture)?;
        if !metering.clock.is_paused() {
            return Ok(());
        }
        metering.recorder.lock().record()?;
        metering.clock.resume();
        self.machine.set_recording_paused(false)?;
        log::info!("Metering capture {} resumed", metering.id);
        Ok(())
    }

    /// Stop the metering capture and describe the finished file.
    pub fn stop_recording(&self) -> Result<RecordingResult, SessionError> {
        let mut capture = self.capture.lock();
        if !matches!(capture.as_ref(), Some(ActiveCapture::Metering(_))) {
            return Err(SessionError::NotActive("no recording in progress".into()));
        }
        let Some(ActiveCapture::Metering(mut metering)) = capture.take() else {
            return Err(SessionError::NotActive("no recording in progress".into()));
        };
        drop(capture);

        metering.timer.stop();
        let duration_ms = metering.clock.elapsed_ms();
        let (stopped, settings, path) = {
            let mut recorder = metering.recorder.lock();
            (recorder.stop(), recorder.settings(), recorder.file_path().to_path_buf())
        };
        self.machine.end_recording();
        stopped?;

        let result = build_result(&path, &settings, duration_ms)?;
        let metadata = RecordingMetadata::from_result(&metering.id, CaptureMode::Metering, &result, None);
        if let Err(e) = write_metadata(&metadata, &path) {
            log::warn!("Failed to write recording metadata: {}", e);
        }
        log::info!(
            "Metering capture {} stopped: {} ms, {} bytes",
            metering.id,
            result.duration_ms,
            result.size_bytes
        );
        Ok(result)
    }

    /// Start a streaming capture delivering PCM chunks to the sink.
    ///
    /// Chunks are emitted per hardware buffer, or batched to at least
    /// `interval_ms` of audio when given.
    pub fn start_microphone_stream(
        &self,
        settings: RecordingSettings,
        interval_ms: Option<u64>,
    ) -> Result<StartResult, SessionError> {
        settings.validate().map_err(SessionError::InvalidConfiguration)?;

        let mut capture = self.capture.lock();
        if capture.is_some() {
            return Err(SessionError::AlreadyActive("a capture is already running".into()));
        }

        let hardware = Arc::clone(self.machine.hardware());
        let output_rate = settings
            .desired_sample_rate
            .or(settings.sample_rate)
            .unwrap_or_else(|| hardware.hardware_sample_rate());
        let output = AudioFormat::new(output_rate, settings.channels.unwrap_or(1));
        let bit_depth = settings.bit_depth_or_default();
        let stream_id = uuid::Uuid::new_v4().to_string();

        let mut pipeline = StreamPipeline::new(stream_id.clone(), output, bit_depth, interval_ms.filter(|ms| *ms > 0));
        if settings.persist_to_file {
            let path = self
                .recordings_directory
                .join(format!("stream_{}.{}", stream_id, ContainerKind::Wav.extension()));
            pipeline.persist_to(path)?;
        }
        let file_uri = pipeline.file_uri().unwrap_or_default().to_string();
        let pipeline = Arc::new(Mutex::new(pipeline));

        if let Err(e) = self.machine.begin_recording() {
            discard_pipeline(&pipeline);
            return Err(e);
        }

        let callback: AudioBufferCallback = {
            let pipeline = Arc::clone(&pipeline);
            let sinks = Arc::clone(&self.sinks);
            let silenced = Arc::clone(&self.silenced);
            Arc::new(move |buffer: CapturedBuffer<'_>| {
                let event = pipeline.lock().process(buffer, silenced.load(Ordering::Relaxed));
                if let Some(event) = event {
                    sinks.emit(|s| s.on_audio_data(&event));
                }
            })
        };
        let request = InputRequest {
            sample_rate: settings.sample_rate,
            channels: settings.channels,
        };
        let stream = match hardware.open_input(request, callback) {
            Ok(stream) => stream,
            Err(e) => {
                self.machine.end_recording();
                discard_pipeline(&pipeline);
                return Err(e);
            }
        };

        log::info!(
            "Microphone stream {} started: input {:?}, output {} Hz / {} ch / {} bit",
            stream_id,
            stream.format(),
            output.sample_rate,
            output.channels,
            bit_depth
        );
        *capture = Some(ActiveCapture::Streaming(StreamingCapture { stream, pipeline }));

        Ok(StartResult {
            mode: CaptureMode::Streaming,
            file_uri,
            mime_type: ContainerKind::Wav.mime_type().to_string(),
            sample_rate: output.sample_rate,
            channels: Some(output.channels),
            bit_depth: Some(bit_depth),
        })
    }

    /// Stop the streaming capture. `Some` when the stream was persisted to a file.
    pub fn stop_microphone_stream(&self) -> Result<Option<RecordingResult>, SessionError> {
        let mut capture = self.capture.lock();
        if !matches!(capture.as_ref(), Some(ActiveCapture::Streaming(_))) {
            return Err(SessionError::NotActive("no microphone stream in progress".into()));
        }
        let Some(ActiveCapture::Streaming(mut streaming)) = capture.take() else {
            return Err(SessionError::NotActive("no microphone stream in progress".into()));
        };
        drop(capture);

        streaming.stream.stop();
        let (last, finished, stream_id, output, bit_depth, duration_ms) = {
            let mut pipeline = streaming.pipeline.lock();
            let last = pipeline.flush(self.silenced.load(Ordering::Relaxed));
            let finished = pipeline.finish();
            (
                last,
                finished,
                pipeline.stream_id().to_string(),
                pipeline.output_format(),
                pipeline.bit_depth(),
                pipeline.emitted_ms(),
            )
        };
        if let Some(event) = last {
            self.sinks.emit(|s| s.on_audio_data(&event));
        }
        self.machine.end_recording();

        let Some((path, checksum)) = finished? else {
            log::info!("Microphone stream {} stopped ({} ms)", stream_id, duration_ms);
            return Ok(None);
        };

        let settings = RecorderSettings {
            container: ContainerKind::Wav,
            sample_rate: Some(output.sample_rate),
            channels: Some(output.channels),
            bit_depth: Some(bit_depth),
            quality: None,
        };
        let result = build_result(&path, &settings, duration_ms)?;
        let metadata = RecordingMetadata::from_result(&stream_id, CaptureMode::Streaming, &result, Some(checksum));
        if let Err(e) = write_metadata(&metadata, &path) {
            log::warn!("Failed to write recording metadata: {}", e);
        }
        log::info!(
            "Microphone stream {} stopped: {} ms persisted to {}",
            stream_id,
            duration_ms,
            path.display()
        );
        Ok(Some(result))
    }

    /// Flip silence for streaming chunks. Returns the new state.
    pub fn toggle_silence(&self) -> bool {
        let silenced = !self.silenced.fetch_xor(true, Ordering::SeqCst);
        log::info!("Microphone silence {}", if silenced { "on" } else { "off" });
        silenced
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced.load(Ordering::SeqCst)
    }

    /// Stop any capture, discarding its result.
    pub fn shutdown(&self) {
        let result = match self.active_mode() {
            Some(CaptureMode::Metering) => self.stop_recording().map(|_| ()),
            Some(CaptureMode::Streaming) => self.stop_microphone_stream().map(|_| ()),
            None => return,
        };
        if let Err(e) = result {
            log::warn!("Failed to stop capture during shutdown: {}", e);
        }
    }

    fn open_recorder(&self) -> Result<(String, Arc<Mutex<Box<dyn MeteredRecorder>>>), SessionError> {
        std::fs::create_dir_all(&self.recordings_directory)
            .map_err(|e| SessionError::FileIoFailure(format!("failed to create recordings directory: {}", e)))?;
        let id = uuid::Uuid::new_v4().to_string();
        let base_path = self.recordings_directory.join(format!("recording_{}", id));

        let mut recorder = self.machine.hardware().open_metered_recorder(&base_path)?;
        recorder.record()?;
        Ok((id, Arc::new(Mutex::new(recorder))))
    }
}

fn metering_capture(capture: &mut Option<ActiveCapture>) -> Result<&mut MeteringCapture, SessionError> {
    match capture.as_mut() {
        Some(ActiveCapture::Metering(metering)) => Ok(metering),
        Some(ActiveCapture::Streaming(_)) => Err(SessionError::NotActive(
            "pause and resume apply to metering captures only".into(),
        )),
        None => Err(SessionError::NotActive("no recording in progress".into())),
    }
}

fn discard_pipeline(pipeline: &Mutex<StreamPipeline>) {
    let mut pipeline = pipeline.lock();
    if let Ok(Some((path, _))) = pipeline.finish() {
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("Failed to remove unused stream file {}: {}", path.display(), e);
        }
    }
}
