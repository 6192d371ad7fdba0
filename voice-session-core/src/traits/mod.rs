pub mod audio_hardware;
pub mod capture_provider;
pub mod event_sink;
pub mod output_graph;
