pub mod files;
pub mod metadata;
pub mod pcm_writer;
pub mod result_builder;
