//! Server state and configuration.

use std::time::Instant;

use crate::bridge::Bridge;
use crate::platform::Platform;
use crate::transport::Adapter;

/// Default address for `btprinter serve`.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8765")
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

/// Application state shared across handlers.
pub struct AppState<A: Adapter, P: Platform> {
    pub config: ServerConfig,
    pub bridge: Bridge<A, P>,
    /// Server boot, reported by the health endpoint.
    pub started: Instant,
}

impl<A: Adapter, P: Platform> AppState<A, P> {
    pub fn new(config: ServerConfig, bridge: Bridge<A, P>) -> Self {
        Self {
            config,
            bridge,
            started: Instant::now(),
        }
    }
}
