//! # Connection Configuration
//!
//! Tunables for the connection manager and the RFCOMM backend.
//!
//! ## Usage
//!
//! ```
//! use std::time::Duration;
//! use btprinter::config::ManagerConfig;
//!
//! let config = ManagerConfig {
//!     connect_timeout: Duration::from_secs(5),
//!     ..Default::default()
//! };
//! assert_eq!(config.rfcomm_channel, 1);
//! ```

use std::time::Duration;

use uuid::Uuid;

/// Serial Port Profile service class UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Default time allowed for socket setup.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default chunk size for writes (bytes)
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default delay between chunks
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,

    /// Service record to connect to. Almost every printer exposes SPP.
    pub service_uuid: Uuid,

    /// RFCOMM channel used when a new `/dev/rfcommN` binding is created.
    /// Channel 1 is standard for SPP.
    pub rfcomm_channel: u8,

    /// Writes larger than this are split into chunks.
    pub chunk_size: usize,

    /// Pause between chunks, giving the printer time to drain its buffer.
    pub chunk_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            service_uuid: SPP_UUID,
            rfcomm_channel: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spp_uuid() {
        assert_eq!(
            SPP_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.service_uuid, SPP_UUID);
        assert_eq!(config.chunk_size, 4096);
    }
}
