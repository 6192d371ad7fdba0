//! Dedicated owner threads for cpal streams.
//!
//! `cpal::Stream` cannot move between threads on every host, so each stream
//! is built, played and dropped on its own named thread. The thread parks on
//! a channel until it is told to stop.

use std::sync::mpsc;
use std::thread;

use crate::error::CpalError;

pub(crate) struct StreamThread {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamThread {
    /// Run `build` on a new thread, start the stream it returns and keep it
    /// alive until `stop`. Returns whatever `build` reported alongside the stream.
    pub(crate) fn spawn<T, F>(name: &str, build: F) -> Result<(Self, T), CpalError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<(cpal::Stream, T), CpalError> + Send + 'static,
    {
        use cpal::traits::StreamTrait;

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<T, CpalError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let (stream, info) = match build() {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CpalError::PlayStream(e)));
                    return;
                }
                if ready_tx.send(Ok(info)).is_err() {
                    return;
                }
                // Returns once `stop` drops the sender.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| CpalError::Thread(format!("failed to spawn {}: {}", name, e)))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| CpalError::Thread(format!("{} exited during setup", name)));
        match ready {
            Ok(Ok(info)) => Ok((
                Self {
                    stop_tx: Some(stop_tx),
                    handle: Some(handle),
                },
                info,
            )),
            Ok(Err(e)) | Err(e) => {
                drop(stop_tx);
                if handle.join().is_err() {
                    log::error!("{} panicked during setup", name);
                }
                Err(e)
            }
        }
    }

    /// Drop the stream and wait for its thread.
    pub(crate) fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Stream thread panicked");
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}
