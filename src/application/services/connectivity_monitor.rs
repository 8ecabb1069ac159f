use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Receives deduplicated online/offline transitions.
#[async_trait]
pub trait ConnectivityListener: Send + Sync {
    /// Applies a transition. Calls arrive in signal order, one at a time, so
    /// implementations must not wait on remote calls here.
    async fn connectivity_changed(&self, online: bool);

    /// Follow-up work after a transition to online. May overlap later
    /// transitions.
    async fn reconnected(&self) {}
}

/// Forwards platform connectivity signals to a single listener, once per
/// actual transition.
pub struct ConnectivityMonitor {
    listener: Arc<dyn ConnectivityListener>,
    last: Mutex<Option<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(listener: Arc<dyn ConnectivityListener>) -> Self {
        Self {
            listener,
            last: Mutex::new(None),
        }
    }

    /// Records the current state without notifying, so that a later
    /// identical signal is treated as a repeat.
    pub async fn prime(&self, online: bool) {
        *self.last.lock().await = Some(online);
    }

    pub async fn current(&self) -> Option<bool> {
        *self.last.lock().await
    }

    /// Returns `true` when the signal was a transition and was forwarded.
    ///
    /// The reconnect follow-up runs inline before this returns.
    pub async fn signal(&self, online: bool) -> bool {
        if !self.deliver(online).await {
            return false;
        }
        if online {
            self.listener.reconnected().await;
        }
        true
    }

    /// Follows a platform signal until its sender is dropped.
    ///
    /// Transitions are applied on this task in order. Only the reconnect
    /// follow-up is spawned, so a later offline signal is never held up by
    /// the sync it starts.
    pub fn watch(self: Arc<Self>, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let online = *signal.borrow_and_update();
                if self.deliver(online).await && online {
                    let listener = Arc::clone(&self.listener);
                    tokio::spawn(async move {
                        listener.reconnected().await;
                    });
                }
                if signal.changed().await.is_err() {
                    tracing::debug!(
                        target: "guestlist::connectivity",
                        "connectivity signal closed"
                    );
                    break;
                }
            }
        })
    }

    /// Records and applies one transition while holding the dedup lock, so
    /// the listener never observes transitions out of order.
    async fn deliver(&self, online: bool) -> bool {
        let mut last = self.last.lock().await;
        if !Self::record(&mut last, online) {
            return false;
        }
        self.listener.connectivity_changed(online).await;
        true
    }

    fn record(last: &mut Option<bool>, online: bool) -> bool {
        if *last == Some(online) {
            tracing::trace!(
                target: "guestlist::connectivity",
                online,
                "repeated connectivity signal ignored"
            );
            return false;
        }
        *last = Some(online);
        tracing::info!(
            target: "guestlist::connectivity",
            online,
            "connectivity transition"
        );
        true
    }
}
