//! Network reachability signal.
//!
//! The monitor is a passive sensor: platform code feeds it reachability
//! changes, the sync worker subscribes to them. It never does I/O itself.

use std::sync::Arc;

use tokio::sync::watch;

/// Observable "can we reach the network" flag
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    /// Record a reachability change. Returns whether the value changed.
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
                tracing::info!("Connectivity restored");
            } else {
                tracing::info!("Connectivity lost");
            }
        }
        changed
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to reachability changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Resolve once `rx` reports offline; never resolves if the monitor is gone.
pub(crate) async fn wait_until_offline(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|online| !*online).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn set_online_reports_transitions_only() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_online());

        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn wait_until_offline_resolves_on_loss() {
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();

        let waiter = tokio::spawn(async move { wait_until_offline(&mut rx).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        monitor.set_online(false);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish once offline")
            .unwrap();
    }
}
