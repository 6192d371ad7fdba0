//! cpal input capture.
//!
//! The audio callback only copies samples to f32 and hands them to a
//! dispatch thread, which runs the consumer.

use std::sync::mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Sample, SizedSample};

use voice_session_core::models::audio_models::AudioFormat;
use voice_session_core::models::error::SessionError;
use voice_session_core::traits::capture_provider::{AudioBufferCallback, CapturedBuffer, InputRequest, InputStream};

use crate::device_monitor::RouteNotifier;
use crate::error::CpalError;
use crate::stream_thread::StreamThread;

/// Pick a supported config matching the request, else the device default.
fn choose_config(device: &cpal::Device, request: InputRequest) -> Result<cpal::SupportedStreamConfig, CpalError> {
    let default = device.default_input_config()?;
    if request.sample_rate.is_none() && request.channels.is_none() {
        return Ok(default);
    }

    let rate = request
        .sample_rate
        .map(|r| cpal::SampleRate(r as u32))
        .unwrap_or_else(|| default.sample_rate());
    let channels = request.channels.unwrap_or_else(|| default.channels());

    let matching = device.supported_input_configs()?.find(|range| {
        range.channels() == channels
            && range.sample_format() == default.sample_format()
            && range.min_sample_rate() <= rate
            && rate <= range.max_sample_rate()
    });
    match matching {
        Some(range) => Ok(range.with_sample_rate(rate)),
        None => {
            log::info!(
                "Input device cannot deliver {} Hz / {} ch, using its default",
                rate.0,
                channels
            );
            Ok(default)
        }
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<Vec<f32>>,
    routes: RouteNotifier,
) -> Result<cpal::Stream, CpalError>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|s| f32::from_sample(*s)).collect();
            let _ = tx.send(samples);
        },
        move |err| routes.stream_error(&err),
        None,
    )?;
    Ok(stream)
}

/// A running input stream plus the thread that delivers its buffers.
pub(crate) struct CaptureThreads {
    stream: Option<StreamThread>,
    dispatcher: Option<thread::JoinHandle<()>>,
    format: AudioFormat,
}

impl CaptureThreads {
    /// Open the default input device and call `deliver` for every buffer,
    /// off the audio thread.
    pub(crate) fn start(
        name: &str,
        request: InputRequest,
        routes: RouteNotifier,
        mut deliver: Box<dyn FnMut(&[f32], AudioFormat) + Send>,
    ) -> Result<Self, CpalError> {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();

        let (stream, format) = StreamThread::spawn(name, move || {
            let device = cpal::default_host()
                .default_input_device()
                .ok_or(CpalError::NoDevice("input"))?;
            let supported = choose_config(&device, request)?;
            let config = supported.config();
            let format = AudioFormat::new(config.sample_rate.0 as f64, config.channels);
            log::info!(
                "Input device '{}': {} Hz, {} ch, {:?}",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                config.channels,
                supported.sample_format()
            );

            let stream = match supported.sample_format() {
                cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, tx, routes)?,
                cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, tx, routes)?,
                cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, tx, routes)?,
                other => return Err(CpalError::UnsupportedSampleFormat(other)),
            };
            Ok((stream, format))
        })?;

        let dispatcher = thread::Builder::new()
            .name(format!("{}-dispatch", name))
            .spawn(move || {
                for samples in rx {
                    deliver(&samples, format);
                }
            })
            .map_err(|e| CpalError::Thread(format!("failed to spawn dispatch thread: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
            dispatcher: Some(dispatcher),
            format,
        })
    }

    pub(crate) fn format(&self) -> AudioFormat {
        self.format
    }

    /// Stop the device, then drain and join the dispatch thread.
    pub(crate) fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                log::error!("Input dispatch thread panicked");
            }
        }
    }
}

impl Drop for CaptureThreads {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Streaming-mode input on the default device.
pub struct CpalInputStream {
    threads: CaptureThreads,
}

impl CpalInputStream {
    pub fn open(
        request: InputRequest,
        callback: AudioBufferCallback,
        routes: RouteNotifier,
    ) -> Result<Self, SessionError> {
        let deliver = Box::new(move |samples: &[f32], format: AudioFormat| {
            callback(CapturedBuffer {
                samples,
                sample_rate: format.sample_rate,
                channels: format.channels,
                reported_power_db: None,
            });
        });
        let threads = CaptureThreads::start("cpal-input", request, routes, deliver)?;
        Ok(Self { threads })
    }
}

impl InputStream for CpalInputStream {
    fn format(&self) -> AudioFormat {
        self.threads.format()
    }

    fn stop(&mut self) {
        self.threads.stop();
        log::debug!("Input stream stopped");
    }
}
