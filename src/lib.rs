//! # btprinter - Bluetooth Thermal Printer Bridge
//!
//! btprinter controls ESC/POS thermal receipt printers over Bluetooth
//! classic (RFCOMM / Serial Port Profile). It provides:
//!
//! - **Connection management**: one owned printer connection with probe,
//!   timeout and collapse-on-error semantics
//! - **Protocol encoding**: `<size>//<text>` directives, raw bytes and a
//!   fixed ESC/POS command table
//! - **Transport**: BlueZ/RFCOMM backend for Linux and an in-memory mock
//! - **Bridge**: the method-call surface host applications talk to, also
//!   served over HTTP
//!
//! ## Quick Start
//!
//! ```no_run
//! use btprinter::{
//!     config::ManagerConfig,
//!     connection::ConnectionManager,
//!     protocol::commands,
//!     transport::BluezAdapter,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), btprinter::PrinterError> {
//! let config = ManagerConfig::default();
//! let manager = ConnectionManager::new(BluezAdapter::new(config.clone()), config);
//!
//! manager.connect("66:22:B3:0A:11:9C").await?;
//! manager.print_text("4//HELLO\n").await?;
//! manager.print_text("world\n").await?;
//! manager.write(commands::FEED_PAPER_AND_CUT.to_vec()).await?;
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS command table and text encoding |
//! | [`connection`] | Connection manager |
//! | [`transport`] | Adapter and sink backends |
//! | [`bridge`] | Method-call dispatcher |
//! | [`server`] | HTTP front for the bridge |
//! | [`platform`] | Host OS queries |
//! | [`config`] | Tunables |
//! | [`error`] | Error types |

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use config::ManagerConfig;
pub use connection::{ConnectStatus, ConnectionManager};
pub use error::PrinterError;
pub use transport::{BluezAdapter, MockAdapter};
