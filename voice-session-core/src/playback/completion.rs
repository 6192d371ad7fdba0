use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::error::SessionError;

/// How a queue entry left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The hardware finished rendering the buffer (or it was empty).
    Played,
    /// Removed by `clear_queue`, `stop_playback`, pause or teardown.
    Cancelled,
}

pub type PlaybackResult = Result<PlaybackOutcome, SessionError>;

struct Slot {
    result: Mutex<Option<PlaybackResult>>,
    resolved: Condvar,
}

/// Write side of a completion. Owned by its queue entry.
///
/// Resolves exactly once. Dropping an unresolved token resolves it as
/// `Cancelled`, so a handle can never wait forever.
pub struct CompletionToken {
    slot: Option<Arc<Slot>>,
}

/// Read side of a completion, returned to the caller of `enqueue`.
#[derive(Clone)]
pub struct CompletionHandle {
    slot: Arc<Slot>,
}

/// Create a connected token/handle pair.
pub fn completion_pair() -> (CompletionToken, CompletionHandle) {
    let slot = Arc::new(Slot {
        result: Mutex::new(None),
        resolved: Condvar::new(),
    });
    (
        CompletionToken {
            slot: Some(Arc::clone(&slot)),
        },
        CompletionHandle { slot },
    )
}

impl CompletionToken {
    pub fn resolve(mut self, result: PlaybackResult) {
        self.complete(result);
    }

    pub fn played(self) {
        self.resolve(Ok(PlaybackOutcome::Played));
    }

    pub fn cancel(self) {
        self.resolve(Ok(PlaybackOutcome::Cancelled));
    }

    pub fn reject(self, error: SessionError) {
        self.resolve(Err(error));
    }

    fn complete(&mut self, result: PlaybackResult) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        let mut guard = slot.result.lock();
        if guard.is_none() {
            *guard = Some(result);
            slot.resolved.notify_all();
        }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        self.complete(Ok(PlaybackOutcome::Cancelled));
    }
}

impl CompletionHandle {
    /// Block until the entry resolves.
    pub fn wait(&self) -> PlaybackResult {
        let mut guard = self.slot.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.slot.resolved.wait(&mut guard);
        }
    }

    /// Block up to `timeout`. `None` if still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<PlaybackResult> {
        let mut guard = self.slot.result.lock();
        if guard.is_none() {
            let _ = self.slot.resolved.wait_while_for(&mut guard, |r| r.is_none(), timeout);
        }
        guard.clone()
    }

    pub fn try_result(&self) -> Option<PlaybackResult> {
        self.slot.result.lock().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.result.lock().is_some()
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("result", &self.try_result())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn resolves_once() {
        let (token, handle) = completion_pair();
        assert!(!handle.is_resolved());

        token.played();

        assert_eq!(handle.try_result(), Some(Ok(PlaybackOutcome::Played)));
        assert_eq!(handle.wait(), Ok(PlaybackOutcome::Played));
    }

    #[test]
    fn dropped_token_cancels() {
        let (token, handle) = completion_pair();
        drop(token);
        assert_eq!(handle.wait(), Ok(PlaybackOutcome::Cancelled));
    }

    #[test]
    fn rejection_carries_the_error() {
        let (token, handle) = completion_pair();
        token.reject(SessionError::SessionUnavailable("busy".into()));
        assert_eq!(
            handle.wait(),
            Err(SessionError::SessionUnavailable("busy".into()))
        );
    }

    #[test]
    fn wait_timeout_on_pending_returns_none() {
        let (_token, handle) = completion_pair();
        assert_eq!(handle.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn wait_wakes_on_resolve_from_other_thread() {
        let (token, handle) = completion_pair();
        let resolver = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.played();
        });

        assert_eq!(
            handle.wait_timeout(Duration::from_secs(2)),
            Some(Ok(PlaybackOutcome::Played))
        );
        resolver.join().unwrap();
    }
}
