use crate::protocol::{CLIENT_PORT, SERVER_PORT};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// How the receive loop waits for datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReceiveMode {
    /// Non-blocking receive, sleeping `poll_interval_ms` when nothing arrived
    #[default]
    NonBlocking,
    /// Blocking receive with a `poll_interval_ms` timeout as the throttle
    BlockingTimeout,
}

/// Addresses and timing of the bridge.
///
/// The defaults are the fixed constants of the protocol; the library never
/// reads them from a file or the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Local address the bridge binds
    pub bind_addr: SocketAddr,
    /// Address of the capture host
    pub peer_addr: SocketAddr,
    pub receive_mode: ReceiveMode,
    /// Upper bound on one receive wait, and the sleep between empty polls
    pub poll_interval_ms: u64,
    /// Discovery resend interval while no controller is bound
    pub keepalive_interval_ms: u64,
    /// How long enumeration waits for the first discovery response
    pub discovery_timeout_ms: u64,
    /// How long release waits for the receive thread to exit
    pub shutdown_timeout_ms: u64,
    /// Capacity of the buffered event queue handed to readers
    pub event_queue_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, SERVER_PORT)),
            peer_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, CLIENT_PORT)),
            receive_mode: ReceiveMode::NonBlocking,
            poll_interval_ms: 16,
            keepalive_interval_ms: 2000,
            discovery_timeout_ms: 2000,
            shutdown_timeout_ms: 500,
            event_queue_capacity: 256,
        }
    }
}

impl BridgeSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
