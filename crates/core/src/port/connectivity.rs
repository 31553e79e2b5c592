// Connectivity Monitor Port
// reason: watch channel gives "current value + change notification" in one primitive
use async_trait::async_trait;
use tokio::sync::watch;

/// Source of the online/offline signal
///
/// `subscribe` hands out a receiver whose value is the latest known state;
/// dropping the receiver is the unsubscribe.
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    /// Current connectivity state
    async fn is_online(&self) -> bool;

    /// Subscribe to connectivity transitions
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity driven by the host application
///
/// For platforms that already get reachability callbacks from the OS: forward
/// them with `set_online` and the queue reacts.
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    /// Publish a new state; subscribers are only woken on an actual transition
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

#[async_trait]
impl ConnectivityMonitor for ManualConnectivity {
    async fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_connectivity_transitions() {
        let monitor = ManualConnectivity::new(false);
        let mut rx = monitor.subscribe();
        assert!(!monitor.is_online().await);

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online().await);
    }

    #[tokio::test]
    async fn test_same_state_does_not_notify() {
        let monitor = ManualConnectivity::new(true);
        let rx = monitor.subscribe();
        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
