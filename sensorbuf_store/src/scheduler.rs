//! Owned periodic tick thread
//!
//! Started by its owner and stopped exactly once. `stop` wakes the thread
//! immediately and joins it; no tick runs after it returns.

use crate::error::BufferResult;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Background thread invoking a task at a fixed interval.
#[derive(Debug)]
pub struct TickScheduler {
    interval: Duration,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TickScheduler {
    /// Spawn a thread named `name` that calls `task` every `interval`.
    ///
    /// The thread exits on `stop`, on drop, or when `task` returns
    /// `ControlFlow::Break`.
    pub fn start<F>(name: &str, interval: Duration, mut task: F) -> BufferResult<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if task().is_break() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Tick thread exiting");
            })?;

        debug!(?interval, "Tick scheduler started");
        Ok(Self {
            interval,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Configured period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` until `stop` has been called.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The thread may already have exited on its own.
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the task: the loop exits on the next wake.
                return;
            }
            if handle.join().is_err() {
                warn!("Tick thread panicked");
            }
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
