use crate::models::audio_models::{AudioBuffer, AudioFormat};
use crate::models::error::SessionError;

/// Invoked once when a scheduled buffer finishes playing.
///
/// A graph that is stopped or torn down drops pending callbacks without
/// calling them.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Player node → mixer → hardware output.
pub trait OutputGraph: Send {
    /// Format the player node was connected with.
    fn format(&self) -> AudioFormat;

    fn is_engine_running(&self) -> bool;

    fn start_engine(&mut self) -> Result<(), SessionError>;

    fn stop_engine(&mut self);

    fn is_playing(&self) -> bool;

    /// Start the player node.
    fn play(&mut self) -> Result<(), SessionError>;

    /// Hard-stop the player node and drop every scheduled buffer.
    fn stop(&mut self);

    /// Append a buffer; `on_complete` fires after its last frame is rendered.
    fn schedule(&mut self, buffer: AudioBuffer, on_complete: CompletionCallback) -> Result<(), SessionError>;

    /// Disconnect and detach the player node.
    fn teardown(&mut self);
}
