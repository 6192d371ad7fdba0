use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use voice_session_core::models::audio_models::{AudioFormat, ContainerKind};
use voice_session_core::models::error::SessionError;
use voice_session_core::processing::levels::{rms_dbfs, SILENCE_DBFS};
use voice_session_core::processing::resampler::convert_to_int16_pcm;
use voice_session_core::storage::pcm_writer::PcmFileWriter;
use voice_session_core::traits::capture_provider::{InputRequest, MeteredRecorder, RecorderSettings};

use crate::device_monitor::RouteNotifier;
use crate::input::CaptureThreads;

const BIT_DEPTH: u16 = 16;

/// Metering WAV recorder on the default input device.
///
/// Writes 16-bit PCM at the device format and tracks the level of the most
/// recent buffer. Pausing keeps the device open and drops incoming samples.
pub struct CpalMeteredRecorder {
    path: PathBuf,
    routes: RouteNotifier,
    threads: Option<CaptureThreads>,
    format: Option<AudioFormat>,
    writer: Arc<Mutex<PcmFileWriter>>,
    recording: Arc<AtomicBool>,
    power_bits: Arc<AtomicU32>,
}

impl CpalMeteredRecorder {
    pub fn new(path: &Path, routes: RouteNotifier) -> Self {
        let path = path.with_extension(ContainerKind::Wav.extension());
        Self {
            writer: Arc::new(Mutex::new(PcmFileWriter::new(path.clone()))),
            path,
            routes,
            threads: None,
            format: None,
            recording: Arc::new(AtomicBool::new(false)),
            power_bits: Arc::new(AtomicU32::new(SILENCE_DBFS.to_bits())),
        }
    }

    fn open(&mut self) -> Result<(), SessionError> {
        let writer = Arc::clone(&self.writer);
        let recording = Arc::clone(&self.recording);
        let power_bits = Arc::clone(&self.power_bits);

        let deliver = Box::new(move |samples: &[f32], _format: AudioFormat| {
            if !recording.load(Ordering::Relaxed) {
                return;
            }
            power_bits.store(rms_dbfs(samples).to_bits(), Ordering::Relaxed);
            let mut writer = writer.lock();
            if writer.is_open() {
                if let Err(e) = writer.write(&convert_to_int16_pcm(samples)) {
                    log::error!("Failed to write recording: {}", e);
                }
            }
        });

        let threads = CaptureThreads::start("cpal-recorder", InputRequest::default(), self.routes.clone(), deliver)?;
        let format = threads.format();
        self.writer
            .lock()
            .open(format.sample_rate as u32, BIT_DEPTH, format.channels)?;
        self.format = Some(format);
        self.threads = Some(threads);
        log::info!("Recording to {}", self.path.display());
        Ok(())
    }
}

impl MeteredRecorder for CpalMeteredRecorder {
    fn record(&mut self) -> Result<(), SessionError> {
        if self.threads.is_none() {
            self.open()?;
        }
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {
        self.recording.store(false, Ordering::SeqCst);
        self.power_bits.store(SILENCE_DBFS.to_bits(), Ordering::Relaxed);
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.recording.store(false, Ordering::SeqCst);
        if let Some(mut threads) = self.threads.take() {
            threads.stop();
        }
        let mut writer = self.writer.lock();
        if writer.is_open() {
            writer.close()?;
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn average_power(&self) -> f32 {
        if !self.is_recording() {
            return SILENCE_DBFS;
        }
        f32::from_bits(self.power_bits.load(Ordering::Relaxed))
    }

    fn settings(&self) -> RecorderSettings {
        RecorderSettings {
            container: ContainerKind::Wav,
            sample_rate: self.format.map(|f| f.sample_rate),
            channels: self.format.map(|f| f.channels),
            bit_depth: Some(BIT_DEPTH),
            quality: None,
        }
    }

    fn file_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CpalMeteredRecorder {
    fn drop(&mut self) {
        if self.threads.is_some() {
            if let Err(e) = MeteredRecorder::stop(self) {
                log::warn!("Failed to finalize recording: {}", e);
            }
        }
    }
}
