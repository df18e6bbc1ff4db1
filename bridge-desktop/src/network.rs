//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Reachability is a TCP connect to a well-known endpoint; change
/// notifications come from polling that probe.
///
/// Note: Platform-specific implementations (Linux netlink, macOS SystemConfiguration,
/// Windows WinAPI) would be more robust but require additional dependencies.
#[derive(Debug, Clone)]
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self {
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Probe a different `host:port` (useful behind firewalls)
    pub fn with_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = addr.into();
        self
    }

    /// How often the change stream re-probes
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            PROBE_TIMEOUT,
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
        let status = self.check_connectivity().await;
        debug!(status = ?status, probe = %self.probe_addr, "Network probe finished");

        Ok(match status {
            // Desktop can't tell WiFi from Ethernet without platform APIs
            NetworkStatus::Connected => NetworkInfo::connected(Some(NetworkType::Other)),
            _ => NetworkInfo::disconnected(),
        })
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: self.clone(),
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            tokio::time::sleep(self.monitor.poll_interval).await;

            if let Ok(info) = self.monitor.get_network_info().await {
                if self.last_status.as_ref() != Some(&info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_network_info() {
        let monitor = DesktopNetworkMonitor::new();
        let info = monitor.get_network_info().await.unwrap();

        assert!(matches!(
            info.status,
            NetworkStatus::Connected | NetworkStatus::Disconnected
        ));
    }

    #[tokio::test]
    async fn test_unreachable_probe_reports_disconnected() {
        let monitor = DesktopNetworkMonitor::new().with_probe_addr("127.0.0.1:9");

        assert!(!monitor.is_connected().await);
    }

    #[tokio::test]
    async fn test_change_stream_reports_first_status() {
        let monitor = DesktopNetworkMonitor::new()
            .with_probe_addr("127.0.0.1:9")
            .with_poll_interval(Duration::from_millis(10));
        let mut stream = monitor.subscribe_changes().await.unwrap();

        let info = stream.next().await.unwrap();
        assert_eq!(info.status, NetworkStatus::Disconnected);
    }
}
