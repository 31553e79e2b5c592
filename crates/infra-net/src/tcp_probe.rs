// TCP reachability probe
// reason: a connect() to the backend is the cheapest portable "are we online" signal
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info};

use deferq_core::port::ConnectivityMonitor;

/// Connectivity monitor that periodically opens a TCP connection to `addr`
///
/// Online means the last connect attempt succeeded within `connect_timeout`.
/// Subscribers only hear about transitions.
pub struct TcpProbeConnectivity {
    tx: Arc<watch::Sender<bool>>,
    probe_task: JoinHandle<()>,
}

impl TcpProbeConnectivity {
    /// Start probing in the background
    ///
    /// # Arguments
    /// * `addr` - `host:port` to connect to (usually the delivery backend)
    /// * `probe_interval` - Time between probes
    /// * `connect_timeout` - Upper bound for a single connect attempt
    ///
    /// # Example
    /// ```ignore
    /// let monitor = TcpProbeConnectivity::spawn(
    ///     "api.example.com:443",
    ///     Duration::from_secs(5),
    ///     Duration::from_secs(2),
    /// ).await;
    /// ```
    pub async fn spawn(
        addr: impl Into<String>,
        probe_interval: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let addr = addr.into();
        let initially_online = probe_once(&addr, connect_timeout).await;
        info!(addr = %addr, online = initially_online, "Connectivity probe started");

        let (tx, _rx) = watch::channel(initially_online);
        let tx = Arc::new(tx);
        let probe_tx = Arc::clone(&tx);
        let probe_task = tokio::spawn(async move {
            let mut tick = interval(probe_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick.tick().await; // first tick completes immediately

            loop {
                tick.tick().await;
                let online = probe_once(&addr, connect_timeout).await;
                let changed = probe_tx.send_if_modified(|current| {
                    if *current == online {
                        false
                    } else {
                        *current = online;
                        true
                    }
                });
                if changed {
                    info!(addr = %addr, online = online, "Connectivity transition");
                }
            }
        });

        Self { tx, probe_task }
    }
}

/// One connect attempt, bounded by `connect_timeout`
pub async fn probe_once(addr: &str, connect_timeout: Duration) -> bool {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "Probe connect failed");
            false
        }
        Err(_) => {
            debug!(addr = %addr, timeout_ms = connect_timeout.as_millis() as u64, "Probe timed out");
            false
        }
    }
}

#[async_trait]
impl ConnectivityMonitor for TcpProbeConnectivity {
    async fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Drop for TcpProbeConnectivity {
    fn drop(&mut self) {
        self.probe_task.abort();
    }
}
