use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::error::SessionError;
use crate::models::events::{ChunkPlayedEvent, SUSPEND_SOUND_EVENTS_TURN_ID};
use crate::playback::completion::CompletionToken;
use crate::playback::queue::{PlaybackQueue, QueueEntry};
use crate::session::state_machine::StateMachine;
use crate::traits::event_sink::SinkSlot;
use crate::traits::output_graph::{CompletionCallback, OutputGraph};

struct Control {
    running: bool,
    /// Set by pause and route changes; cleared by the next enqueue.
    held: bool,
    /// Queue entry currently scheduled on the graph.
    in_flight: Option<u64>,
    /// Queue ran dry (or the graph was destroyed) since the last dispatch.
    drained: bool,
}

/// Wake-up and bookkeeping shared by the scheduler thread, the state
/// machine and graph completion callbacks.
pub struct SchedulerSignal {
    control: Mutex<Control>,
    wake: Condvar,
}

impl SchedulerSignal {
    pub fn new() -> Self {
        Self {
            control: Mutex::new(Control {
                running: true,
                held: false,
                in_flight: None,
                drained: true,
            }),
            wake: Condvar::new(),
        }
    }

    /// Keep queued entries waiting until the next `release`.
    pub fn hold(&self) {
        self.control.lock().held = true;
    }

    pub fn release(&self) {
        self.control.lock().held = false;
        self.wake.notify_all();
    }

    pub fn is_held(&self) -> bool {
        self.control.lock().held
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.control.lock().in_flight
    }

    /// The graph holding the in-flight buffer is gone; its callback will never fire.
    pub fn reset_in_flight(&self) {
        {
            let mut control = self.control.lock();
            control.in_flight = None;
            control.drained = true;
        }
        self.wake.notify_all();
    }

    pub fn shutdown(&self) {
        self.control.lock().running = false;
        self.wake.notify_all();
    }

    pub fn notify(&self) {
        self.wake.notify_all();
    }

    fn begin(&self, id: u64) {
        self.control.lock().in_flight = Some(id);
    }

    fn finish(&self, id: u64, drained: bool) {
        {
            let mut control = self.control.lock();
            if control.in_flight == Some(id) {
                control.in_flight = None;
            }
            if drained {
                control.drained = true;
            }
        }
        self.wake.notify_all();
    }

    fn take_drained(&self) -> bool {
        std::mem::take(&mut self.control.lock().drained)
    }

    /// Block until an entry can be dispatched. `false` once shut down.
    fn wait_for_work(&self, queue: &PlaybackQueue, poll: Duration) -> bool {
        let mut control = self.control.lock();
        loop {
            if !control.running {
                return false;
            }
            if !control.held && control.in_flight.is_none() && !queue.is_empty() {
                return true;
            }
            self.wake.wait_for(&mut control, poll);
        }
    }

    /// Back off for `delay` or until woken. `false` once shut down.
    fn back_off(&self, delay: Duration) -> bool {
        let mut control = self.control.lock();
        if control.running {
            self.wake.wait_for(&mut control, delay);
        }
        control.running
    }
}

impl Default for SchedulerSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Polling playback scheduler.
///
/// Feeds the output graph one buffer at a time, in FIFO order. When the
/// graph is missing it asks the state machine to acquire one; when the
/// session cannot play right now it retries after a fixed backoff instead
/// of blocking.
pub struct Scheduler {
    signal: Arc<SchedulerSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(
        machine: Arc<StateMachine>,
        queue: Arc<PlaybackQueue>,
        signal: Arc<SchedulerSignal>,
        sinks: Arc<SinkSlot>,
        backoff: Duration,
    ) -> Result<Self, SessionError> {
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("playback-scheduler".into())
            .spawn(move || run(&machine, &queue, &thread_signal, &sinks, backoff))
            .map_err(|e| SessionError::SessionUnavailable(format!("failed to spawn scheduler thread: {}", e)))?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it, unless called from the thread itself.
    pub fn stop(&mut self) {
        self.signal.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Playback scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    machine: &StateMachine,
    queue: &Arc<PlaybackQueue>,
    signal: &Arc<SchedulerSignal>,
    sinks: &Arc<SinkSlot>,
    backoff: Duration,
) {
    log::debug!("Playback scheduler started (backoff {:?})", backoff);
    while signal.wait_for_work(queue, backoff) {
        match machine.with_playback_graph(|graph| dispatch(graph, queue, signal, sinks)) {
            Ok(Some(step)) => {
                if step.value && (step.rebuilt || signal.take_drained()) {
                    sinks.emit(|s| s.on_sound_started());
                }
            }
            Ok(None) => {
                if !signal.back_off(backoff) {
                    break;
                }
            }
            Err(e) => {
                let rejected = queue.reject_all(&e);
                log::warn!("Playback session unavailable, rejected {} queued chunk(s): {}", rejected, e);
            }
        }
    }
    log::debug!("Playback scheduler stopped");
}

/// Schedule the head entry. Returns whether a buffer went to the graph.
fn dispatch(
    graph: &mut dyn OutputGraph,
    queue: &Arc<PlaybackQueue>,
    signal: &Arc<SchedulerSignal>,
    sinks: &Arc<SinkSlot>,
) -> bool {
    let Some(QueueEntry {
        id,
        turn_id,
        buffer,
        token,
    }) = queue.pop_front()
    else {
        return false;
    };

    let pending: Arc<Mutex<Option<CompletionToken>>> = Arc::new(Mutex::new(Some(token)));
    let on_complete: CompletionCallback = {
        let pending = Arc::clone(&pending);
        let queue = Arc::clone(queue);
        let signal = Arc::clone(signal);
        let sinks = Arc::clone(sinks);
        let emit_chunk_events = turn_id != SUSPEND_SOUND_EVENTS_TURN_ID;
        Box::new(move || {
            if let Some(token) = pending.lock().take() {
                token.played();
            }
            let is_final = queue.is_empty();
            signal.finish(id, is_final);
            if emit_chunk_events {
                sinks.emit(|s| s.on_chunk_played(&ChunkPlayedEvent { is_final }));
            }
        })
    };

    log::debug!(
        "Scheduling chunk {} of turn '{}' ({} ms)",
        id,
        turn_id,
        buffer.duration_ms()
    );
    signal.begin(id);
    match graph.schedule(buffer, on_complete) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to schedule chunk {}: {}", id, e);
            signal.finish(id, false);
            if let Some(token) = pending.lock().take() {
                token.reject(e);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{AudioBuffer, AudioFormat, BufferSource, SampleEncoding};

    #[test]
    fn hold_blocks_work_until_release() {
        let signal = SchedulerSignal::new();
        let queue = PlaybackQueue::new();
        let buffer = AudioBuffer::new(
            AudioFormat::new(16000.0, 1),
            BufferSource::Pcm(SampleEncoding::PcmS16Le),
            vec![0.0; 4],
        );
        queue.push(buffer, "A");

        signal.hold();
        assert!(signal.is_held());
        signal.release();
        assert!(signal.wait_for_work(&queue, Duration::from_millis(5)));
    }

    #[test]
    fn finish_ignores_stale_ids() {
        let signal = SchedulerSignal::new();
        signal.begin(7);
        signal.finish(6, false);
        assert_eq!(signal.in_flight(), Some(7));
        signal.finish(7, false);
        assert_eq!(signal.in_flight(), None);
    }

    #[test]
    fn shutdown_ends_waiting() {
        let signal = SchedulerSignal::new();
        signal.shutdown();
        assert!(!signal.wait_for_work(&PlaybackQueue::new(), Duration::from_millis(5)));
        assert!(!signal.back_off(Duration::from_millis(5)));
    }

    #[test]
    fn drained_flag_is_consumed() {
        let signal = SchedulerSignal::new();
        assert!(signal.take_drained());
        assert!(!signal.take_drained());
        signal.reset_in_flight();
        assert!(signal.take_drained());
    }
}
