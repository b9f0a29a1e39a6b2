//! Shutdown coordination for the daemon's background tasks.

use tokio::sync::watch;

/// Latching shutdown flag. Once triggered it stays triggered, so tasks that
/// subscribe late still observe it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `rx` has seen a trigger.
pub async fn triggered(mut rx: watch::Receiver<bool>) {
    // An error means the sender is gone, which also ends the task.
    let _ = rx.wait_for(|stop| *stop).await;
}
