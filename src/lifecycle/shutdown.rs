//! Shutdown coordination for the webhook service.
//!
//! The flag is latched: a task that starts waiting after shutdown was
//! triggered still sees it, so a signal arriving during startup is not lost.

use std::sync::Arc;

use tokio::sync::watch;

/// Latched shutdown flag shared by the signal handler, the server and the
/// watcher supervisor.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Start shutdown. Safe to call more than once and with nobody waiting.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been triggered, including before the call.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
