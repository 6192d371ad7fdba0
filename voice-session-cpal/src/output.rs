//! cpal output graph.
//!
//! ```text
//! schedule() → channel map + resample → Playout ─(audio callback)→ device
//!                                         └─ finished buffers → completion thread → on_complete()
//! ```
//! The audio callback never blocks on the playout lock and never runs a
//! completion callback itself.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{FromSample, Sample, SizedSample};
use parking_lot::Mutex;

use voice_session_core::models::audio_models::{AudioBuffer, AudioFormat};
use voice_session_core::models::error::SessionError;
use voice_session_core::processing::resampler::Resampler;
use voice_session_core::traits::output_graph::{CompletionCallback, OutputGraph};

use crate::device_monitor::RouteNotifier;
use crate::error::CpalError;
use crate::stream_thread::StreamThread;

struct PlayoutItem {
    samples: Vec<f32>,
    position: usize,
    on_complete: Option<CompletionCallback>,
}

/// Buffers waiting for the device, in device format.
#[derive(Default)]
struct Playout {
    items: VecDeque<PlayoutItem>,
    playing: bool,
}

impl Playout {
    fn next_sample(&mut self, completions: &mpsc::Sender<CompletionCallback>) -> f32 {
        if !self.playing {
            return 0.0;
        }
        while let Some(item) = self.items.front_mut() {
            if item.position < item.samples.len() {
                let sample = item.samples[item.position];
                item.position += 1;
                return sample;
            }
            if let Some(done) = self.items.pop_front().and_then(|item| item.on_complete) {
                let _ = completions.send(done);
            }
        }
        0.0
    }
}

fn fill<T>(data: &mut [T], playout: &Mutex<Playout>, completions: &mpsc::Sender<CompletionCallback>)
where
    T: Sample + FromSample<f32>,
{
    let Some(mut playout) = playout.try_lock() else {
        data.fill(T::EQUILIBRIUM);
        return;
    };
    for sample in data.iter_mut() {
        *sample = T::from_sample(playout.next_sample(completions));
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    playout: Arc<Mutex<Playout>>,
    completions: mpsc::Sender<CompletionCallback>,
    routes: RouteNotifier,
) -> Result<cpal::Stream, CpalError>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| fill(data, &playout, &completions),
        move |err| routes.stream_error(&err),
        None,
    )?;
    Ok(stream)
}

/// Player node → default output device.
pub struct CpalOutputGraph {
    format: AudioFormat,
    device_format: Option<AudioFormat>,
    playout: Arc<Mutex<Playout>>,
    stream: Option<StreamThread>,
    completions_tx: Option<mpsc::Sender<CompletionCallback>>,
    dispatcher: Option<thread::JoinHandle<()>>,
    routes: RouteNotifier,
}

impl CpalOutputGraph {
    pub fn new(format: AudioFormat, routes: RouteNotifier) -> Result<Self, SessionError> {
        let (completions_tx, completions_rx) = mpsc::channel::<CompletionCallback>();
        let dispatcher = thread::Builder::new()
            .name("output-completions".into())
            .spawn(move || {
                for on_complete in completions_rx {
                    on_complete();
                }
            })
            .map_err(|e| SessionError::GraphBuildFailure(format!("failed to spawn completion thread: {}", e)))?;

        Ok(Self {
            format,
            device_format: None,
            playout: Arc::new(Mutex::new(Playout::default())),
            stream: None,
            completions_tx: Some(completions_tx),
            dispatcher: Some(dispatcher),
            routes,
        })
    }

    fn open_stream(&self) -> Result<(StreamThread, AudioFormat), CpalError> {
        let completions = self
            .completions_tx
            .clone()
            .ok_or_else(|| CpalError::Thread("output graph was torn down".into()))?;
        let playout = Arc::clone(&self.playout);
        let routes = self.routes.clone();

        StreamThread::spawn("cpal-output", move || {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or(CpalError::NoDevice("output"))?;
            let supported = device.default_output_config()?;
            let config = supported.config();
            let format = AudioFormat::new(config.sample_rate.0 as f64, config.channels);
            log::info!(
                "Output device '{}': {} Hz, {} ch, {:?}",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                config.channels,
                supported.sample_format()
            );

            let stream = match supported.sample_format() {
                cpal::SampleFormat::F32 => build_output::<f32>(&device, &config, playout, completions, routes)?,
                cpal::SampleFormat::I16 => build_output::<i16>(&device, &config, playout, completions, routes)?,
                cpal::SampleFormat::U16 => build_output::<u16>(&device, &config, playout, completions, routes)?,
                other => return Err(CpalError::UnsupportedSampleFormat(other)),
            };
            Ok((stream, format))
        })
    }
}

impl OutputGraph for CpalOutputGraph {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn is_engine_running(&self) -> bool {
        self.stream.is_some()
    }

    fn start_engine(&mut self) -> Result<(), SessionError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let (stream, device_format) = self
            .open_stream()
            .map_err(|e| SessionError::GraphBuildFailure(e.to_string()))?;
        self.stream = Some(stream);
        self.device_format = Some(device_format);
        Ok(())
    }

    fn stop_engine(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log::debug!("Output stream stopped");
        }
    }

    fn is_playing(&self) -> bool {
        self.playout.lock().playing
    }

    fn play(&mut self) -> Result<(), SessionError> {
        if self.stream.is_none() {
            return Err(SessionError::SessionUnavailable("output engine is not running".into()));
        }
        self.playout.lock().playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        let dropped = {
            let mut playout = self.playout.lock();
            playout.playing = false;
            std::mem::take(&mut playout.items)
        };
        if !dropped.is_empty() {
            log::debug!("Dropped {} scheduled buffer(s)", dropped.len());
        }
    }

    fn schedule(&mut self, buffer: AudioBuffer, on_complete: CompletionCallback) -> Result<(), SessionError> {
        let device = self
            .device_format
            .ok_or_else(|| SessionError::SessionUnavailable("output engine is not running".into()))?;
        let source = buffer.format();
        let samples = Resampler::new(device.sample_rate).convert(
            buffer.samples(),
            source.channels.max(1) as usize,
            device.channels.max(1) as usize,
            source.sample_rate,
        );
        self.playout.lock().items.push_back(PlayoutItem {
            samples,
            position: 0,
            on_complete: Some(on_complete),
        });
        Ok(())
    }

    fn teardown(&mut self) {
        self.stop();
        self.stop_engine();
        drop(self.completions_tx.take());
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                log::error!("Output completion thread panicked");
            }
        }
    }
}

impl Drop for CpalOutputGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(samples: Vec<f32>, done: &Arc<AtomicUsize>) -> PlayoutItem {
        let done = Arc::clone(done);
        PlayoutItem {
            samples,
            position: 0,
            on_complete: Some(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })),
        }
    }

    #[test]
    fn plays_items_back_to_back_and_reports_completion() {
        let (tx, rx) = mpsc::channel();
        let done = Arc::new(AtomicUsize::new(0));
        let mut playout = Playout::default();
        playout.playing = true;
        playout.items.push_back(item(vec![0.1, 0.2], &done));
        playout.items.push_back(item(vec![0.3], &done));

        let rendered: Vec<f32> = (0..4).map(|_| playout.next_sample(&tx)).collect();

        assert_eq!(rendered, vec![0.1, 0.2, 0.3, 0.0]);
        for on_complete in rx.try_iter() {
            on_complete();
        }
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stopped_playout_renders_silence() {
        let (tx, rx) = mpsc::channel();
        let done = Arc::new(AtomicUsize::new(0));
        let mut playout = Playout::default();
        playout.items.push_back(item(vec![0.5], &done));

        assert_eq!(playout.next_sample(&tx), 0.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(playout.items.len(), 1);
    }

    #[test]
    fn fill_converts_to_device_samples() {
        let (tx, _rx) = mpsc::channel();
        let playout = Mutex::new(Playout::default());
        {
            let mut guard = playout.lock();
            guard.playing = true;
            guard.items.push_back(PlayoutItem {
                samples: vec![0.5, -0.5],
                position: 0,
                on_complete: None,
            });
        }

        let mut data = [0i16; 3];
        fill(&mut data, &playout, &tx);

        assert_eq!(data[0], 16384);
        assert_eq!(data[1], -16384);
        assert_eq!(data[2], 0);
    }
}
