//! Coalesce bursts of change notifications into single render requests.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sending half: call `trigger` on every edit.
#[derive(Debug, Clone)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
}

/// Receiving half: yields once per quiet period after one or more triggers.
#[derive(Debug)]
pub struct Debounced {
    rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the coalescing task on the current tokio runtime. A notification
    /// fires `window` after the last trigger of a burst.
    pub fn new(window: Duration) -> (Debouncer, Debounced) {
        let (tx, mut triggers) = mpsc::unbounded_channel::<()>();
        let (fire_tx, fire_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            while triggers.recv().await.is_some() {
                let mut closed = false;
                loop {
                    match tokio::time::timeout(window, triggers.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => {
                            // flush the burst now; no trigger can extend it
                            closed = true;
                            break;
                        }
                        Err(_) => break,
                    }
                }
                // a full channel already holds a pending notification
                if let Err(mpsc::error::TrySendError::Closed(_)) = fire_tx.try_send(()) {
                    return;
                }
                if closed {
                    return;
                }
            }
        });

        (Debouncer { tx }, Debounced { rx: fire_rx, task })
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Debounced {
    /// Wait for the next coalesced notification. Returns `None` once every
    /// `Debouncer` is dropped and nothing is pending.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Take a pending notification without waiting.
    pub fn try_recv(&mut self) -> Option<()> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Debounced {
    fn drop(&mut self) {
        self.task.abort();
    }
}
