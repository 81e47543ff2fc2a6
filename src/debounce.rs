//! Trailing-edge debouncing on the tokio timer
//!
//! Every `schedule` restarts the delay; only the last scheduled value is
//! delivered through [`Debouncer::fired`]. Rescheduling aborts the sleeping
//! task, and a generation counter drops anything that slipped into the
//! channel before the abort landed.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

pub struct Debouncer<T: Send + 'static> {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<(u64, T)>,
    rx: mpsc::UnboundedReceiver<(u64, T)>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            delay,
            generation: 0,
            pending: None,
            tx,
            rx,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace whatever is pending with `value` and restart the delay
    pub fn schedule(&mut self, value: T) {
        self.abort_pending();
        self.generation += 1;
        let generation = self.generation;
        let delay = self.delay;
        let tx = self.tx.clone();
        trace!("debounce scheduled (generation {})", generation);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((generation, value));
        }));
    }

    /// Drop the pending value, if any
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.generation += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Resolve with the latest value once its delay has elapsed. Pending
    /// forever while nothing is scheduled.
    pub async fn fired(&mut self) -> Option<T> {
        loop {
            let (generation, value) = self.rx.recv().await?;
            if generation == self.generation {
                self.pending = None;
                return Some(value);
            }
            trace!("dropping stale debounce (generation {})", generation);
        }
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
