//! # Printer Transport Layer
//!
//! This module abstracts the Bluetooth radio and the byte stream that an
//! open RFCOMM socket provides.
//!
//! ## Available Transports
//!
//! - [`bluetooth`]: BlueZ + `/dev/rfcommN` backend (Linux)
//! - [`mock`]: In-memory adapter for tests and dry runs

pub mod bluetooth;
pub mod mock;

use std::io::{self, Write};

use serde::Serialize;
use uuid::Uuid;

use crate::error::PrinterError;

pub use bluetooth::BluezAdapter;
pub use mock::MockAdapter;

/// A write-only byte stream to the printer.
pub trait Sink: Write + Send {
    /// Release the underlying socket. Dropping the sink afterwards must be
    /// harmless.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A paired (bonded) device as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BondedDevice {
    pub name: String,
    pub address: String,
}

impl BondedDevice {
    /// `name#address`, the shape existing bridge callers expect.
    pub fn to_wire(&self) -> String {
        format!("{}#{}", self.name, self.address)
    }
}

/// The local Bluetooth radio.
///
/// Implementations are blocking; the connection manager moves the slow
/// calls onto a blocking worker.
pub trait Adapter: Send + Sync + 'static {
    /// Whether the radio is powered on.
    fn is_enabled(&self) -> bool;

    /// Whether this process may open Bluetooth sockets.
    fn has_permission(&self) -> bool;

    /// Devices that are already bonded.
    fn bonded_devices(&self) -> Result<Vec<BondedDevice>, PrinterError>;

    /// Stop any running inquiry. Discovery slows socket setup down or makes
    /// it fail outright.
    fn cancel_discovery(&self) -> Result<(), PrinterError>;

    /// Open an RFCOMM socket to `address` for the given service record.
    ///
    /// The BlueZ backend resolves the service's channel over SDP and uses
    /// `ManagerConfig::rfcomm_channel` when the lookup finds nothing.
    fn open_rfcomm(&self, address: &str, service: Uuid) -> Result<Box<dyn Sink>, PrinterError>;
}

/// Six colon-separated hex octets, either case. Anything else is rejected
/// before an adapter call is made.
pub fn is_valid_mac(address: &str) -> bool {
    address.len() == 17
        && address.split(':').count() == 6
        && address
            .split(':')
            .all(|octet| octet.len() == 2 && octet.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_addresses() {
        for address in ["66:22:B3:0A:11:9C", "00:11:62:aa:bb:cc", "DC:0D:30:9F:4E:21"] {
            assert!(is_valid_mac(address), "{}", address);
        }
    }

    #[test]
    fn test_rejected_addresses() {
        for address in [
            "",
            "MTP-II",
            "66:22:B3:0A:11",
            "66:22:B3:0A:11:9C:00",
            "66-22-B3-0A-11-9C",
            "66:22:B3:0A:11:9G",
            "6:622:B3:0A:11:9C",
            " 66:22:B3:0A:11:9C",
        ] {
            assert!(!is_valid_mac(address), "{:?}", address);
        }
    }

    #[test]
    fn test_bonded_device_wire_format() {
        let device = BondedDevice {
            name: "MTP-II".to_string(),
            address: "66:22:B3:0A:11:9C".to_string(),
        };
        assert_eq!(device.to_wire(), "MTP-II#66:22:B3:0A:11:9C");
    }
}
