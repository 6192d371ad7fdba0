use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::models::audio_models::AudioBuffer;
use crate::models::error::SessionError;
use crate::playback::completion::{completion_pair, CompletionHandle, CompletionToken};

/// One pending buffer and the token that reports its fate.
pub struct QueueEntry {
    pub id: u64,
    pub turn_id: String,
    pub buffer: AudioBuffer,
    pub token: CompletionToken,
}

/// FIFO of pending playback entries.
///
/// Every operation takes the lock for a single list operation only. Tokens
/// of removed entries are resolved after the lock is released.
pub struct PlaybackQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    next_id: AtomicU64,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a buffer under `turn_id`.
    pub fn push(&self, buffer: AudioBuffer, turn_id: &str) -> CompletionHandle {
        let (token, handle) = completion_pair();
        let entry = QueueEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            turn_id: turn_id.to_string(),
            buffer,
            token,
        };
        self.entries.lock().push_back(entry);
        handle
    }

    pub fn pop_front(&self) -> Option<QueueEntry> {
        self.entries.lock().pop_front()
    }

    /// Remove every entry of `turn_id`, resolving each as cancelled.
    ///
    /// Returns the number of entries removed.
    pub fn clear_turn(&self, turn_id: &str) -> usize {
        let removed: Vec<QueueEntry> = {
            let mut entries = self.entries.lock();
            let (removed, kept): (VecDeque<_>, VecDeque<_>) =
                entries.drain(..).partition(|e| e.turn_id == turn_id);
            *entries = kept;
            removed.into()
        };
        let count = removed.len();
        for entry in removed {
            entry.token.cancel();
        }
        count
    }

    /// Remove every entry, resolving each as cancelled.
    pub fn clear_all(&self) -> usize {
        let removed = self.take_all();
        let count = removed.len();
        for entry in removed {
            entry.token.cancel();
        }
        count
    }

    /// Remove every entry, rejecting each with `error`.
    pub fn reject_all(&self, error: &SessionError) -> usize {
        let removed = self.take_all();
        let count = removed.len();
        for entry in removed {
            entry.token.reject(error.clone());
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn take_all(&self) -> Vec<QueueEntry> {
        self.entries.lock().drain(..).collect()
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{AudioFormat, BufferSource, SampleEncoding};
    use crate::playback::completion::PlaybackOutcome;

    fn buffer(frames: usize) -> AudioBuffer {
        AudioBuffer::new(
            AudioFormat::new(16000.0, 1),
            BufferSource::Pcm(SampleEncoding::PcmS16Le),
            vec![0.0; frames],
        )
    }

    #[test]
    fn fifo_order_with_increasing_ids() {
        let queue = PlaybackQueue::new();
        queue.push(buffer(1), "A");
        queue.push(buffer(2), "A");
        queue.push(buffer(3), "B");

        let order: Vec<usize> = std::iter::from_fn(|| queue.pop_front())
            .map(|e| e.buffer.frame_count())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn clear_turn_keeps_other_turns_in_order() {
        let queue = PlaybackQueue::new();
        let a1 = queue.push(buffer(1), "A");
        let b1 = queue.push(buffer(2), "B");
        let a2 = queue.push(buffer(3), "A");
        let b2 = queue.push(buffer(4), "B");

        assert_eq!(queue.clear_turn("A"), 2);

        assert_eq!(a1.try_result(), Some(Ok(PlaybackOutcome::Cancelled)));
        assert_eq!(a2.try_result(), Some(Ok(PlaybackOutcome::Cancelled)));
        assert!(!b1.is_resolved());
        assert!(!b2.is_resolved());
        assert_eq!(queue.pop_front().map(|e| e.buffer.frame_count()), Some(2));
        assert_eq!(queue.pop_front().map(|e| e.buffer.frame_count()), Some(4));
    }

    #[test]
    fn clear_unknown_turn_is_noop() {
        let queue = PlaybackQueue::new();
        queue.push(buffer(1), "A");
        assert_eq!(queue.clear_turn("Z"), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn reject_all_propagates_error() {
        let queue = PlaybackQueue::new();
        let handle = queue.push(buffer(1), "A");
        queue.reject_all(&SessionError::GraphBuildFailure("no device".into()));
        assert!(matches!(handle.wait(), Err(SessionError::GraphBuildFailure(_))));
        assert!(queue.is_empty());
    }
}
