pub mod decoder;
pub mod levels;
pub mod resampler;
pub mod wav_format;
