//! Chunk decoding: base64 payload → `AudioBuffer`.
//!
//! Raw PCM chunks are reinterpreted at the playback graph's format and never
//! resampled. Containers (WAV/M4A) keep their own rate and channel layout.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::models::audio_models::{AudioBuffer, AudioFormat, BufferSource, ContainerKind, SampleEncoding};
use crate::models::error::SessionError;

/// Decode a base64 PCM chunk.
///
/// `encoding` is the caller's declared format name. `None` means the
/// documented default (`pcm_s16le`); an unknown name is `UnsupportedFormat`.
pub fn decode_chunk(encoded: &str, encoding: Option<&str>, format: AudioFormat) -> Result<AudioBuffer, SessionError> {
    let encoding = match encoding {
        Some(name) => name.parse::<SampleEncoding>()?,
        None => SampleEncoding::default(),
    };
    let bytes = decode_base64(encoded)?;
    decode_pcm(&bytes, encoding, format)
}

/// Reinterpret little-endian PCM bytes at `format`.
pub fn decode_pcm(bytes: &[u8], encoding: SampleEncoding, format: AudioFormat) -> Result<AudioBuffer, SessionError> {
    let channels = format.channels.max(1) as usize;
    let frame_size = encoding.bytes_per_sample() * channels;
    if bytes.len() % frame_size != 0 {
        return Err(SessionError::DecodeFailure(format!(
            "{} bytes is not a whole number of {} frames ({} bytes each)",
            bytes.len(),
            encoding,
            frame_size
        )));
    }

    let samples: Vec<f32> = match encoding {
        SampleEncoding::PcmS16Le => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        SampleEncoding::PcmF32Le => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    };

    Ok(AudioBuffer::new(format, BufferSource::Pcm(encoding), samples))
}

/// Decode a base64 WAV or M4A container.
pub fn decode_container(encoded: &str) -> Result<AudioBuffer, SessionError> {
    let bytes = decode_base64(encoded)?;
    decode_container_bytes(bytes)
}

/// Decode an in-memory WAV or M4A container, identified by its magic bytes.
pub fn decode_container_bytes(bytes: Vec<u8>) -> Result<AudioBuffer, SessionError> {
    let kind = ContainerKind::sniff(&bytes)
        .ok_or_else(|| SessionError::UnsupportedFormat("payload is neither WAV nor M4A".into()))?;

    let mut hint = Hint::new();
    hint.with_extension(kind.extension());

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SessionError::DecodeFailure(format!("failed to probe {} container: {}", kind.extension(), e)))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SessionError::DecodeFailure("no audio track found".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SessionError::UnsupportedFormat(format!("no decoder for track: {}", e)))?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SessionError::DecodeFailure(format!("failed to read packet: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(SessionError::DecodeFailure(format!("decode failed: {}", e))),
        }
    }

    let (Some(sample_rate), Some(channels)) = (sample_rate, channels) else {
        return Err(SessionError::DecodeFailure("container does not declare its format".into()));
    };

    log::debug!(
        "Decoded {} container: {} frames at {} Hz, {} ch",
        kind.extension(),
        samples.len() / channels.max(1) as usize,
        sample_rate,
        channels
    );

    Ok(AudioBuffer::new(
        AudioFormat::new(sample_rate as f64, channels),
        BufferSource::Container(kind),
        samples,
    ))
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, SessionError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| SessionError::DecodeFailure(format!("invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::resampler::to_pcm_bytes;
    use crate::processing::wav_format::WavSpec;
    use approx::assert_relative_eq;

    fn mono_16k() -> AudioFormat {
        AudioFormat::new(16000.0, 1)
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 / len as f32) - 0.5).collect()
    }

    #[test]
    fn s16_and_f32_have_equal_sample_counts() {
        let wave = ramp(160);
        let s16 = STANDARD.encode(to_pcm_bytes(&wave, 16));
        let f32_payload = STANDARD.encode(to_pcm_bytes(&wave, 32));

        let a = decode_chunk(&s16, Some("pcm_s16le"), mono_16k()).unwrap();
        let b = decode_chunk(&f32_payload, Some("pcm_f32le"), mono_16k()).unwrap();

        assert_eq!(a.samples().len(), b.samples().len());
        assert_eq!(a.frame_count(), 160);
        for (x, y) in a.samples().iter().zip(b.samples()) {
            assert_relative_eq!(x, y, epsilon = 1e-3);
        }
    }

    #[test]
    fn missing_encoding_defaults_to_s16() {
        let payload = STANDARD.encode([0x00u8, 0x40, 0x00, 0xC0]);
        let buffer = decode_chunk(&payload, None, mono_16k()).unwrap();
        assert_eq!(buffer.source(), BufferSource::Pcm(SampleEncoding::PcmS16Le));
        assert_relative_eq!(buffer.samples()[0], 0.5);
        assert_relative_eq!(buffer.samples()[1], -0.5);
    }

    #[test]
    fn unknown_encoding_is_unsupported() {
        let payload = STANDARD.encode([0u8; 4]);
        let err = decode_chunk(&payload, Some("mp3"), mono_16k()).unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedFormat(_)));
    }

    #[test]
    fn partial_frame_is_decode_failure() {
        let payload = STANDARD.encode([0u8; 6]);
        let err = decode_chunk(&payload, Some("pcm_f32le"), mono_16k()).unwrap_err();
        assert!(matches!(err, SessionError::DecodeFailure(_)));
    }

    #[test]
    fn stereo_frames_need_both_channels() {
        let payload = STANDARD.encode([0u8; 6]);
        let err = decode_chunk(&payload, Some("pcm_s16le"), AudioFormat::new(16000.0, 2)).unwrap_err();
        assert!(matches!(err, SessionError::DecodeFailure(_)));
    }

    #[test]
    fn bad_base64_is_decode_failure() {
        let err = decode_chunk("not base64!!", None, mono_16k()).unwrap_err();
        assert!(matches!(err, SessionError::DecodeFailure(_)));
    }

    #[test]
    fn empty_chunk_decodes_to_empty_buffer() {
        let buffer = decode_chunk("", None, mono_16k()).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn wav_container_keeps_its_own_format() {
        let pcm = to_pcm_bytes(&ramp(480), 16);
        let mut wav = WavSpec::new(24000, 2, 16).header(pcm.len() as u32).to_vec();
        wav.extend_from_slice(&pcm);

        let buffer = decode_container(&STANDARD.encode(&wav)).unwrap();

        assert_eq!(buffer.format(), AudioFormat::new(24000.0, 2));
        assert_eq!(buffer.frame_count(), 240);
        assert_eq!(buffer.source(), BufferSource::Container(ContainerKind::Wav));
    }

    #[test]
    fn unknown_container_is_unsupported() {
        let err = decode_container(&STANDARD.encode(b"OggS-not-supported")).unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedFormat(_)));
    }
}
