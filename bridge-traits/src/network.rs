//! Network Monitoring Abstraction
//!
//! Provides network reachability information.

use crate::error::Result;

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network information
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
}

impl NetworkInfo {
    /// Info describing a reachable network.
    pub fn connected(network_type: Option<NetworkType>) -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type,
        }
    }

    /// Info describing no reachable network.
    pub fn disconnected() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            network_type: None,
        }
    }

    /// Only a confirmed connection counts as reachable.
    pub fn is_connected(&self) -> bool {
        self.status == NetworkStatus::Connected
    }
}

/// Network monitor trait
///
/// Provides reachability information so the core can:
/// - Surface an offline advisory to the user
/// - Kick off a cache prefetch once connectivity returns
///
/// # Platform Support
///
/// - **Desktop**: TCP reachability probe
/// - **iOS**: Network framework (NWPathMonitor)
/// - **Android**: ConnectivityManager
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::NetworkMonitor;
///
/// async fn watch(monitor: &dyn NetworkMonitor) -> Result<()> {
///     let mut stream = monitor.subscribe_changes().await?;
///     while let Some(info) = stream.next().await {
///         println!("connected: {}", info.is_connected());
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of network info updates. Implementations should
    /// emit an event whenever network status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait::async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
