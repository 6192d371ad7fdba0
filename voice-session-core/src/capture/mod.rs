pub mod clock;
pub mod microphone;
pub mod stream_pipeline;
