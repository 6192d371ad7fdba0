use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::models::audio_models::AudioFormat;
use crate::models::error::SessionError;
use crate::models::events::{AudioDataEvent, AudioDataMode};
use crate::models::recording_result::file_uri;
use crate::processing::levels::{rms_dbfs, SILENCE_DBFS};
use crate::processing::resampler::{to_pcm_bytes, Resampler};
use crate::storage::pcm_writer::PcmFileWriter;
use crate::traits::capture_provider::CapturedBuffer;

/// Per-capture streaming state: format conversion, batching, encoding and
/// optional persistence of microphone buffers.
///
/// ```text
/// [CapturedBuffer] → remix + resample → pending ─(≥ emit interval)→ PCM bytes ─┬→ AudioDataEvent
///                                                                              └→ PcmFileWriter
/// ```
pub struct StreamPipeline {
    stream_id: String,
    output: AudioFormat,
    bit_depth: u16,
    resampler: Resampler,
    /// Frames to accumulate before emitting; 0 emits every buffer.
    emit_frames: usize,
    pending: Vec<f32>,
    pending_power_db: Option<f32>,
    emitted_frames: u64,
    total_bytes: u64,
    writer: Option<PcmFileWriter>,
    file_uri: Option<String>,
}

impl StreamPipeline {
    pub fn new(stream_id: String, output: AudioFormat, bit_depth: u16, emit_interval_ms: Option<u64>) -> Self {
        let emit_frames = emit_interval_ms
            .map(|ms| (output.sample_rate * ms as f64 / 1000.0) as usize)
            .unwrap_or(0);
        Self {
            stream_id,
            output,
            bit_depth,
            resampler: Resampler::new(output.sample_rate),
            emit_frames,
            pending: Vec::new(),
            pending_power_db: None,
            emitted_frames: 0,
            total_bytes: 0,
            writer: None,
            file_uri: None,
        }
    }

    /// Also write every emitted chunk to a WAV file at `path`.
    pub fn persist_to(&mut self, path: PathBuf) -> Result<(), SessionError> {
        let mut writer = PcmFileWriter::new(path);
        writer.open(self.output.sample_rate as u32, self.bit_depth, self.output.channels)?;
        self.file_uri = Some(file_uri(writer.file_path()));
        self.writer = Some(writer);
        Ok(())
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|w| w.file_path())
    }

    pub fn file_uri(&self) -> Option<&str> {
        self.file_uri.as_deref()
    }

    /// Duration of everything emitted so far.
    pub fn emitted_ms(&self) -> u64 {
        self.output.frames_to_ms(self.emitted_frames as usize)
    }

    /// Feed one hardware buffer. Returns an event once enough audio is pending.
    pub fn process(&mut self, buffer: CapturedBuffer<'_>, silenced: bool) -> Option<AudioDataEvent> {
        let converted = self.resampler.convert(
            buffer.samples,
            buffer.channels.max(1) as usize,
            self.output.channels as usize,
            buffer.sample_rate,
        );
        if let Some(power) = buffer.reported_power_db {
            self.pending_power_db = Some(power);
        }
        self.pending.extend_from_slice(&converted);

        let frames = self.pending.len() / self.output.channels.max(1) as usize;
        if frames == 0 || frames < self.emit_frames {
            return None;
        }
        self.emit(silenced)
    }

    /// Emit whatever is still pending, regardless of the emit interval.
    pub fn flush(&mut self, silenced: bool) -> Option<AudioDataEvent> {
        if self.pending.is_empty() {
            return None;
        }
        self.emit(silenced)
    }

    /// Close the file, if persisting. Returns its path and SHA-256 checksum.
    pub fn finish(&mut self) -> Result<Option<(PathBuf, String)>, SessionError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(None);
        };
        let checksum = writer.close()?;
        Ok(Some((writer.file_path().to_path_buf(), checksum)))
    }

    fn emit(&mut self, silenced: bool) -> Option<AudioDataEvent> {
        let samples = std::mem::take(&mut self.pending);
        let reported = self.pending_power_db.take();
        let frames = samples.len() / self.output.channels.max(1) as usize;

        let (samples, level) = if silenced {
            (vec![0.0; samples.len()], SILENCE_DBFS)
        } else {
            let level = reported
                .map(|db| db.clamp(SILENCE_DBFS, 0.0))
                .unwrap_or_else(|| rms_dbfs(&samples));
            (samples, level)
        };

        let bytes = to_pcm_bytes(&samples, self.bit_depth);
        let position_ms = self.emitted_ms();
        self.emitted_frames += frames as u64;
        self.total_bytes += bytes.len() as u64;

        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write(&bytes) {
                log::error!("Failed to write audio data: {}", e);
            }
        }

        Some(AudioDataEvent {
            mode: AudioDataMode::Microphone,
            file_uri: self.file_uri.clone(),
            sound_level_dbfs: level,
            encoded_chunk: Some(STANDARD.encode(&bytes)),
            chunk_position_ms: Some(position_ms),
            chunk_size: Some(bytes.len()),
            total_size: Some(self.total_bytes),
            stream_id: Some(self.stream_id.clone()),
        })
    }
}
