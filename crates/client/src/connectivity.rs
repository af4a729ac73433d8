//! Injected network availability.
//!
//! The platform layer owns detection and pushes changes in with
//! [`Connectivity::set_online`]. Everything else reads the current value or
//! subscribes to transitions.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Observable online/offline flag.
///
/// Cloning shares the same underlying state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Create a provider with an initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// A provider that starts online.
    #[must_use]
    pub fn online() -> Self {
        Self::new(true)
    }

    /// A provider that starts offline.
    #[must_use]
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Whether the network is currently believed to be reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a new state. Subscribers are only woken on an actual change.
    ///
    /// Returns `true` if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                info!("Connectivity restored");
            } else {
                warn!("Connectivity lost, serving cached data");
            }
        }

        changed
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}
