//! Trailing-edge debounce gate.
//!
//! Triggers that arrive within the quiescence window of each other collapse
//! into one execution, started once the window has passed without a new
//! trigger. Earlier triggers in a burst have no effect of their own.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Window used by the schedule board.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(250);

/// Cloneable trigger side of a [`DebounceGate`]. Triggering a closed gate is a no-op.
#[derive(Debug, Clone)]
pub struct DebounceTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl DebounceTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

pub struct DebounceGate {
    trigger: DebounceTrigger,
    worker: JoinHandle<()>,
    window: Duration,
}

impl DebounceGate {
    /// Spawns the gate's worker on the current Tokio runtime.
    ///
    /// Each execution of `action` runs as its own task, so a slow action does
    /// not hold back the next window.
    pub fn spawn<F, Fut>(window: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let worker = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                loop {
                    tokio::select! {
                        biased;
                        next = rx.recv() => {
                            if next.is_none() {
                                return;
                            }
                        }
                        () = tokio::time::sleep(window) => break,
                    }
                }
                tokio::spawn(action());
            }
        });

        Self {
            trigger: DebounceTrigger { tx },
            worker,
            window,
        }
    }

    pub fn trigger(&self) {
        self.trigger.trigger();
    }

    pub fn handle(&self) -> DebounceTrigger {
        self.trigger.clone()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Stops the worker; a pending execution is dropped.
    pub fn close(&self) {
        self.worker.abort();
    }
}

impl Drop for DebounceGate {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
