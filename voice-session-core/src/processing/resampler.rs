/// Fits interleaved `f32` audio to another rate or channel layout.
///
/// Linear interpolation between neighbouring frames. Good enough for speech;
/// backends use it to match decoded chunks to the device, streaming capture
/// uses it to honour a desired sample rate.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    output_rate: f64,
}

impl Resampler {
    pub fn new(output_rate: f64) -> Self {
        Self { output_rate }
    }

    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    /// Resample `samples` recorded at `input_rate`. Equal rates copy through.
    pub fn resample(&self, samples: &[f32], channels: usize, input_rate: f64) -> Vec<f32> {
        let channels = channels.max(1);
        let frames: Vec<&[f32]> = samples.chunks_exact(channels).collect();
        if frames.is_empty() || (input_rate - self.output_rate).abs() < 0.01 {
            return samples.to_vec();
        }

        let step = input_rate / self.output_rate;
        let out_frames = (frames.len() as f64 / step).round() as usize;
        let last = frames.len() - 1;

        let mut out = Vec::with_capacity(out_frames * channels);
        for n in 0..out_frames {
            let pos = n as f64 * step;
            let left = (pos.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let t = (pos - left as f64).clamp(0.0, 1.0) as f32;
            out.extend(
                frames[left]
                    .iter()
                    .zip(frames[right])
                    .map(|(a, b)| a + (b - a) * t),
            );
        }
        out
    }

    /// Remix to `to_channels`, then resample.
    pub fn convert(&self, samples: &[f32], from_channels: usize, to_channels: usize, input_rate: f64) -> Vec<f32> {
        let remixed = remix(samples, from_channels, to_channels);
        self.resample(&remixed, to_channels, input_rate)
    }
}

/// Average every frame down to one channel.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 | 1 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Change the channel count. Mono fans out to every output channel; other
/// layouts pass through mono first.
pub fn remix(samples: &[f32], from_channels: usize, to_channels: usize) -> Vec<f32> {
    let (from, to) = (from_channels.max(1), to_channels.max(1));
    if from == to {
        return samples.to_vec();
    }
    let mono = downmix_to_mono(samples, from);
    if to == 1 {
        return mono;
    }
    mono.iter()
        .flat_map(|&s| std::iter::repeat(s).take(to))
        .collect()
}

/// Encode samples as little-endian PCM at `bit_depth`.
///
/// 8-bit is unsigned with 128 as zero, 32-bit is IEEE float, anything else
/// becomes signed 16-bit. Input is clamped to [-1, 1].
pub fn to_pcm_bytes(samples: &[f32], bit_depth: u16) -> Vec<u8> {
    match bit_depth {
        8 => samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * 127.0 + 128.0).round() as u8)
            .collect(),
        32 => samples
            .iter()
            .flat_map(|s| s.clamp(-1.0, 1.0).to_le_bytes())
            .collect(),
        _ => convert_to_int16_pcm(samples),
    }
}

/// Signed 16-bit little-endian PCM, scaled by `i16::MAX`.
pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
        .collect()
}
