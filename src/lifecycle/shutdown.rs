//! Shutdown coordination for the service.

use tokio::sync::broadcast;

use crate::lifecycle::signals;

/// Coordinator for graceful shutdown.
///
/// The server subscribes once; tests and embedders call [`Shutdown::trigger`]
/// instead of sending a signal.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on an OS stop signal or a triggered [`Shutdown`], whichever is first.
pub async fn shutdown_signal(mut rx: broadcast::Receiver<()>) {
    tokio::select! {
        _ = signals::terminate() => {}
        _ = rx.recv() => tracing::info!("Shutdown triggered"),
    }
    tracing::info!("Shutdown signal received, draining in-flight requests");
}
