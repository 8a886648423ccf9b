// Shutdown Broadcast

use tokio::sync::watch;

/// Read side of the one-shot shutdown broadcast
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Non-blocking check; a dropped sender counts as shutdown
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until shutdown is requested (returns at once if it already was)
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|closed| *closed).await;
    }
}

/// Write side of the shutdown broadcast
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Close the signal
    ///
    /// Idempotent: returns true only for the call that actually closed it,
    /// later calls neither notify receivers again nor fail.
    pub fn shutdown(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
