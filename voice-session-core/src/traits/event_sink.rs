use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::events::{AudioDataEvent, ChunkPlayedEvent, DeviceReconnectedReason};
use crate::models::state::SessionState;

/// Outbound notifications from the engine.
///
/// Called from engine threads (scheduler, metering timer, capture dispatch,
/// a backend's completion thread), never from the caller's thread.
/// Implementations must return quickly and marshal to their own thread if
/// they need to do real work. Fan-out to multiple listeners is the
/// implementation's concern.
///
/// A callback must not call back into `AudioSessionEngine` synchronously.
/// The calling thread may be one the engine joins while tearing down the
/// output graph (`stop_playback`, `pause_playback`, `destroy`), and that
/// join would then wait on itself.
pub trait EventSink: Send + Sync {
    /// Level telemetry, plus audio in streaming mode.
    fn on_audio_data(&self, event: &AudioDataEvent);

    /// A scheduled chunk finished playing.
    fn on_chunk_played(&self, event: &ChunkPlayedEvent);

    /// The output route changed.
    fn on_device_reconnected(&self, reason: DeviceReconnectedReason);

    /// Playback started after the queue had drained or the graph was rebuilt.
    fn on_sound_started(&self) {}

    fn on_state_changed(&self, _state: SessionState) {}
}

/// The single registered sink reference.
#[derive(Default)]
pub struct SinkSlot {
    sink: RwLock<Option<Arc<dyn EventSink>>>,
}

impl SinkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, sink: Option<Arc<dyn EventSink>>) {
        *self.sink.write() = sink;
    }

    /// Run `f` against the registered sink, if any.
    ///
    /// The sink is cloned out first so no lock is held while it runs.
    pub fn emit(&self, f: impl FnOnce(&dyn EventSink)) {
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            f(sink.as_ref());
        }
    }
}
