//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const CACHE_TTL: Duration = Duration::from_secs(10);

/// Desktop network monitor implementation
///
/// Reachability is decided by opening a TCP connection to a probe address,
/// normally the music server itself. Results are cached for a few seconds so
/// hot paths that consult the monitor do not pay for a connect each time.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    cached_info: Arc<Mutex<Option<(Instant, NetworkInfo)>>>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor probing a public resolver
    pub fn new() -> Self {
        Self::for_server(DEFAULT_PROBE_ADDR)
    }

    /// Create a monitor that probes `host:port` of the music server
    pub fn for_server(addr: impl Into<String>) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: Duration::from_secs(5),
            cached_info: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let mut cached = self.cached_info.lock().await;

        if let Some((checked_at, info)) = cached.as_ref() {
            if checked_at.elapsed() < CACHE_TTL {
                return Ok(info.clone());
            }
        }

        let status = self.check_connectivity().await;
        debug!(probe = %self.probe_addr, ?status, "Checked network connectivity");

        // Desktop does not distinguish WiFi from Ethernet
        let info = match status {
            NetworkStatus::Connected => NetworkInfo::connected(NetworkType::Other),
            _ => NetworkInfo::disconnected(),
        };

        *cached = Some((Instant::now(), info.clone()));
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_listener_is_connected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let monitor = DesktopNetworkMonitor::for_server(addr.to_string());
        let info = monitor.get_network_info().await.unwrap();

        assert_eq!(info.status, NetworkStatus::Connected);
        assert!(monitor.is_connected().await);
    }

    #[tokio::test]
    async fn test_closed_port_is_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let monitor = DesktopNetworkMonitor::for_server(addr.to_string())
            .with_probe_timeout(Duration::from_millis(500));
        let info = monitor.get_network_info().await.unwrap();

        assert_eq!(info.status, NetworkStatus::Disconnected);
    }
}
