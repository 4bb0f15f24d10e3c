//! Connectivity status
//!
//! The platform layer reports reachability through [`NetworkStatus::set_online`];
//! the client reads it before every request and replays deferred requests when
//! it flips back to online.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared online/offline flag with change notification
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatus {
    /// Create a status starting `online` or offline
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Whether the device is currently believed to be online
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current reachability. Subscribers are woken only on change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
        }
    }

    /// Receiver observing every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
