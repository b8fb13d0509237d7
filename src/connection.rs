//! # Connection Manager
//!
//! Owns the single printer connection of a process (or of whichever
//! component holds the manager) and everything that touches it.
//!
//! ## Lifecycle
//!
//! ```text
//!            connect() ok
//!   Empty ─────────────────▶ Holding(link)
//!     ▲                          │
//!     │   disconnect()           │
//!     ├──────────────────────────┤
//!     │   any write/probe error  │
//!     └──────────────────────────┘
//! ```
//!
//! A failed write never retries: the link is dropped and the next call
//! has to connect again from scratch.
//!
//! ## Concurrency
//!
//! The slot sits behind a [`tokio::sync::Mutex`]. `connect` holds the lock
//! for the whole socket handshake, so a second caller waits and then sees
//! `AlreadyConnected` instead of opening a duplicate socket. All adapter
//! and sink I/O runs on the blocking pool.
//!
//! ## Cancellation
//!
//! Blocking work cannot be interrupted, so a dropped future only stops
//! waiting:
//!
//! - A cancelled write finishes in the background. The connection stays
//!   in place, and if that write fails the link is cleared on the next call.
//! - A handshake that times out (or whose `connect` is dropped) stays
//!   registered as the one attempt in flight. The next `connect` waits for
//!   it instead of starting another, and adopts the socket if it was for
//!   the same address. `disconnect` marks it to be closed instead.
//!
//! ## Example
//!
//! ```
//! use btprinter::config::ManagerConfig;
//! use btprinter::connection::{ConnectStatus, ConnectionManager};
//! use btprinter::transport::MockAdapter;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), btprinter::PrinterError> {
//! let adapter = MockAdapter::new();
//! let manager = ConnectionManager::new(adapter.clone(), ManagerConfig::default());
//!
//! assert_eq!(manager.connect("00:11:22:33:44:55").await?, ConnectStatus::Connected);
//! manager.print_text("3//Hello\n").await?;
//! assert!(manager.probe().await);
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::PrinterError;
use crate::protocol::text::{self, PrintDirective};
use crate::transport::{Adapter, BondedDevice, Sink, is_valid_mac};

/// Written by [`ConnectionManager::probe`]. A space prints nothing.
pub const PROBE_PAYLOAD: &[u8] = b" ";

/// Outcome of a successful [`ConnectionManager::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// A new socket was opened.
    Connected,
    /// A connection already existed; nothing was opened.
    AlreadyConnected,
}

/// The open socket, shared with whichever blocking task is using it.
struct Link {
    sink: std::sync::Mutex<Box<dyn Sink>>,
    broken: AtomicBool,
}

impl Link {
    fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            sink: std::sync::Mutex::new(sink),
            broken: AtomicBool::new(false),
        }
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Run `f` on the sink. The first error marks the link broken for good.
    fn run<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut dyn Sink) -> io::Result<()>,
    {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_broken() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link already failed",
            ));
        }
        let result = f(&mut **sink);
        if result.is_err() {
            self.broken.store(true, Ordering::Release);
        }
        result
    }

    fn close(&self) -> io::Result<()> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).close()
    }
}

/// The live connection.
struct Connection {
    address: String,
    link: Arc<Link>,
    since: Instant,
}

type OpenResult = Result<Box<dyn Sink>, PrinterError>;

/// A socket handshake running on the blocking pool.
struct PendingOpen {
    address: String,
    handle: JoinHandle<OpenResult>,
    /// Close the socket when it arrives instead of adopting it.
    discard: bool,
}

#[derive(Default)]
struct Slot {
    conn: Option<Connection>,
    opening: Option<PendingOpen>,
}

impl Slot {
    /// Drop a connection whose link failed while nobody was waiting on it.
    fn reap(&mut self) {
        if let Some(conn) = self.conn.take_if(|conn| conn.link.is_broken()) {
            warn!("Device {} was disconnected", conn.address);
        }
    }
}

/// Snapshot of the live connection, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub address: String,
    pub uptime: Duration,
}

pub struct ConnectionManager<A: Adapter> {
    adapter: Arc<A>,
    config: ManagerConfig,
    slot: Mutex<Slot>,
}

impl<A: Adapter> ConnectionManager<A> {
    /// Create an empty manager. No I/O happens until the first call.
    pub fn new(adapter: A, config: ManagerConfig) -> Self {
        Self {
            adapter: Arc::new(adapter),
            config,
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Run a blocking adapter call on the blocking pool.
    async fn on_adapter<T, F>(&self, f: F) -> Result<T, PrinterError>
    where
        F: FnOnce(&A) -> T + Send + 'static,
        T: Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || f(&adapter))
            .await
            .map_err(|e| PrinterError::Transport(format!("Task error: {}", e)))
    }

    /// Whether the Bluetooth radio is powered on.
    pub async fn is_adapter_enabled(&self) -> bool {
        self.on_adapter(|a| a.is_enabled()).await.unwrap_or(false)
    }

    /// Bonded devices. Empty without permission or when the adapter can't
    /// be queried.
    pub async fn list_paired_devices(&self) -> Vec<BondedDevice> {
        let result = self
            .on_adapter(|a| {
                if !a.has_permission() {
                    return Err(PrinterError::PermissionDenied);
                }
                a.bonded_devices()
            })
            .await
            .and_then(|r| r);

        match result {
            Ok(devices) => devices,
            Err(e) => {
                debug!("Listing paired devices failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Start the blocking handshake for `address`.
    fn start_open(&self, address: &str) -> PendingOpen {
        info!("Connecting to {}...", address);
        let adapter = Arc::clone(&self.adapter);
        let target = address.to_string();
        let service = self.config.service_uuid;
        let handle = tokio::task::spawn_blocking(move || {
            if !adapter.is_enabled() {
                return Err(PrinterError::AdapterDisabled);
            }
            if let Err(e) = adapter.cancel_discovery() {
                debug!("Could not cancel discovery: {}", e);
            }
            adapter.open_rfcomm(&target, service)
        });

        PendingOpen {
            address: address.to_string(),
            handle,
            discard: false,
        }
    }

    /// Connect to the printer at `address`.
    ///
    /// ## Errors
    ///
    /// - [`PrinterError::PermissionDenied`]: checked before anything else
    /// - [`PrinterError::InvalidAddress`]: not `XX:XX:XX:XX:XX:XX`
    /// - [`PrinterError::AdapterDisabled`]: radio is off
    /// - [`PrinterError::Timeout`]: handshake exceeded `connect_timeout`
    /// - [`PrinterError::Transport`]: the socket could not be opened
    ///
    /// Only one handshake runs at a time. If an earlier one timed out and
    /// is still running, this call waits on it (up to `connect_timeout`)
    /// and keeps its socket when the address matches.
    pub async fn connect(&self, address: &str) -> Result<ConnectStatus, PrinterError> {
        if !self.on_adapter(|a| a.has_permission()).await? {
            warn!("Bluetooth permissions not granted");
            return Err(PrinterError::PermissionDenied);
        }

        let mut slot = self.slot.lock().await;
        slot.reap();
        if let Some(conn) = slot.conn.as_ref() {
            debug!("Already connected to {}", conn.address);
            return Ok(ConnectStatus::AlreadyConnected);
        }

        if !is_valid_mac(address) {
            return Err(PrinterError::InvalidAddress(address.to_string()));
        }

        let timeout = self.config.connect_timeout;
        loop {
            let fresh = slot.opening.is_none();
            let pending = slot
                .opening
                .get_or_insert_with(|| self.start_open(address));

            let joined = tokio::time::timeout(timeout, &mut pending.handle).await;
            let target = pending.address.clone();
            let discard = pending.discard;
            let Ok(joined) = joined else {
                warn!("Connection to {} timed out after {:?}", target, timeout);
                return Err(PrinterError::Timeout(timeout));
            };
            slot.opening = None;

            let result = joined
                .map_err(|e| PrinterError::Transport(format!("Task error: {}", e)))
                .and_then(|r| r);

            match result {
                Ok(sink) if !discard && target.eq_ignore_ascii_case(address) => {
                    slot.conn = Some(Connection {
                        address: address.to_string(),
                        link: Arc::new(Link::new(sink)),
                        since: Instant::now(),
                    });
                    info!("Connected to {}", address);
                    return Ok(ConnectStatus::Connected);
                }
                Err(e) if fresh => {
                    warn!("Connection to {} failed: {}", address, e);
                    return Err(e);
                }
                // Leftover from an abandoned attempt; dropping the sink closes it.
                _ => debug!("Discarding late connection attempt to {}", target),
            }
        }
    }

    /// Run `f` against the sink on the blocking pool. An I/O error drops
    /// the connection.
    ///
    /// The connection stays in the slot while `f` runs, so dropping the
    /// returned future never loses a healthy link.
    async fn with_sink<F>(&self, f: F) -> Result<(), PrinterError>
    where
        F: FnOnce(&mut dyn Sink) -> io::Result<()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        slot.reap();
        let link = slot
            .conn
            .as_ref()
            .map(|conn| Arc::clone(&conn.link))
            .ok_or(PrinterError::NotConnected)?;

        let result = match tokio::task::spawn_blocking(move || link.run(f)).await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(format!("Task error: {}", e))),
        };

        if let Err(e) = result {
            if let Some(conn) = slot.conn.take() {
                warn!("Device {} was disconnected: {}", conn.address, e);
            }
            return Err(PrinterError::Transport(format!("Write failed: {}", e)));
        }
        Ok(())
    }

    /// Write bytes to the printer.
    pub async fn write(&self, data: Vec<u8>) -> Result<(), PrinterError> {
        self.with_sink(move |sink| {
            sink.write_all(&data)?;
            sink.flush()
        })
        .await
    }

    /// Encode a `<size>//<text>` directive and write it.
    pub async fn print_text(&self, input: &str) -> Result<(), PrinterError> {
        self.write(text::encode_text(input)).await
    }

    /// Write an already parsed directive; its text is printed verbatim.
    pub async fn print_directive(&self, directive: &PrintDirective<'_>) -> Result<(), PrinterError> {
        self.write(text::encode_directive(directive)).await
    }

    /// Truncate each value to a byte and write the result.
    pub async fn write_raw(&self, values: &[i64]) -> Result<(), PrinterError> {
        self.write(text::raw_bytes(values)).await
    }

    /// Check the link by writing a single space.
    ///
    /// This is the only way a dead link is noticed: on failure the
    /// connection is cleared and `false` returned.
    pub async fn probe(&self) -> bool {
        self.write(PROBE_PAYLOAD.to_vec()).await.is_ok()
    }

    /// Close the sink and clear the connection. Succeeds when nothing is
    /// connected. A handshake still in flight is closed when it completes.
    pub async fn disconnect(&self) -> Result<(), PrinterError> {
        let mut slot = self.slot.lock().await;
        if let Some(pending) = slot.opening.as_mut() {
            debug!("Abandoning connection attempt to {}", pending.address);
            pending.discard = true;
        }
        slot.reap();
        let Some(conn) = slot.conn.take() else {
            debug!("Disconnect requested while not connected");
            return Ok(());
        };

        let link = conn.link;
        let closed = tokio::task::spawn_blocking(move || link.close())
            .await
            .map_err(|e| PrinterError::Transport(format!("Task error: {}", e)))?;

        match closed {
            Ok(()) => info!("Disconnected from {}", conn.address),
            Err(e) => warn!("Error during disconnection from {}: {}", conn.address, e),
        }
        Ok(())
    }

    /// Whether a connection is held. Does no I/O, so a silently dropped
    /// link still reports `true` until the next write or probe.
    pub async fn is_connected(&self) -> bool {
        let mut slot = self.slot.lock().await;
        slot.reap();
        slot.conn.is_some()
    }

    pub async fn connection_info(&self) -> Option<ConnectionInfo> {
        let mut slot = self.slot.lock().await;
        slot.reap();
        slot.conn.as_ref().map(|conn| ConnectionInfo {
            address: conn.address.clone(),
            uptime: conn.since.elapsed(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands;
    use crate::transport::MockAdapter;
    use pretty_assertions::assert_eq;

    const ADDR: &str = "66:22:B3:0A:11:9C";

    fn manager() -> (MockAdapter, ConnectionManager<MockAdapter>) {
        let adapter = MockAdapter::new();
        let manager = ConnectionManager::new(adapter.clone(), ManagerConfig::default());
        (adapter, manager)
    }

    #[tokio::test]
    async fn test_connect_then_probe() {
        let (adapter, manager) = manager();

        assert_eq!(manager.connect(ADDR).await.unwrap(), ConnectStatus::Connected);
        assert!(manager.is_connected().await);
        assert!(manager.probe().await);
        assert_eq!(adapter.written(), b" ".to_vec());
        assert_eq!(adapter.discovery_cancels(), 1);
        assert_eq!(adapter.last_address().as_deref(), Some(ADDR));
    }

    #[tokio::test]
    async fn test_second_connect_reuses_socket() {
        let (adapter, manager) = manager();

        manager.connect(ADDR).await.unwrap();
        let status = manager.connect("00:11:22:33:44:55").await.unwrap();

        assert_eq!(status, ConnectStatus::AlreadyConnected);
        assert_eq!(adapter.open_count(), 1);
        assert_eq!(manager.connection_info().await.unwrap().address, ADDR);
    }

    #[tokio::test]
    async fn test_concurrent_connects_open_once() {
        let adapter = MockAdapter::new();
        adapter.set_open_delay(Duration::from_millis(50));
        let manager = ConnectionManager::new(adapter.clone(), ManagerConfig::default());

        let (a, b) = tokio::join!(manager.connect(ADDR), manager.connect(ADDR));
        let mut statuses = vec![a.unwrap(), b.unwrap()];
        statuses.sort_by_key(|s| *s == ConnectStatus::AlreadyConnected);

        assert_eq!(
            statuses,
            vec![ConnectStatus::Connected, ConnectStatus::AlreadyConnected]
        );
        assert_eq!(adapter.open_count(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_is_distinct() {
        let (adapter, manager) = manager();
        adapter.set_permission(false);

        let err = manager.connect(ADDR).await.unwrap_err();
        assert!(matches!(err, PrinterError::PermissionDenied));
        assert_eq!(adapter.open_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let (adapter, manager) = manager();
        let err = manager.connect("printer").await.unwrap_err();
        assert!(matches!(err, PrinterError::InvalidAddress(_)));
        assert!(adapter.last_address().is_none());
    }

    #[tokio::test]
    async fn test_adapter_disabled() {
        let (adapter, manager) = manager();
        adapter.set_enabled(false);

        let err = manager.connect(ADDR).await.unwrap_err();
        assert!(matches!(err, PrinterError::AdapterDisabled));
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_state_empty() {
        let (adapter, manager) = manager();
        adapter.set_fail_open(true);

        let err = manager.connect(ADDR).await.unwrap_err();
        assert!(err.is_transport());
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let adapter = MockAdapter::new();
        adapter.set_open_delay(Duration::from_millis(300));
        let config = ManagerConfig {
            connect_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let manager = ConnectionManager::new(adapter.clone(), config);

        let err = manager.connect(ADDR).await.unwrap_err();
        assert!(matches!(err, PrinterError::Timeout(_)));
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_write_failure_collapses_state() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();

        adapter.set_fail_writes(true);
        let err = manager.print_text("hello").await.unwrap_err();
        assert!(err.is_transport());
        assert!(!manager.is_connected().await);
        assert!(!manager.probe().await);

        // Reconnect from clean state
        adapter.set_fail_writes(false);
        assert_eq!(manager.connect(ADDR).await.unwrap(), ConnectStatus::Connected);
        assert_eq!(adapter.open_count(), 2);
        assert!(manager.probe().await);
    }

    #[tokio::test]
    async fn test_probe_failure_clears() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();
        adapter.set_fail_writes(true);

        assert!(!manager.probe().await);
        assert!(manager.connection_info().await.is_none());
    }

    #[tokio::test]
    async fn test_not_connected() {
        let (_adapter, manager) = manager();
        assert!(!manager.probe().await);
        assert!(matches!(
            manager.write_raw(&[1, 2, 3]).await.unwrap_err(),
            PrinterError::NotConnected
        ));
    }

    #[tokio::test]
    async fn test_print_text_bytes() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();

        manager.print_text("3//Hi").await.unwrap();

        let mut expected: Vec<u8> = Vec::new();
        expected.extend(commands::SIZE[0]);
        expected.extend(commands::CANCEL_MULTIBYTE);
        expected.extend(commands::SELECT_ESCAPE_CHARSET);
        expected.extend(commands::SIZE[3]);
        expected.extend(b"Hi");
        assert_eq!(adapter.written(), expected);
    }

    #[tokio::test]
    async fn test_write_raw_wraps() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();
        manager.write_raw(&[104, 101, 108, 108, 111, 266]).await.unwrap();
        assert_eq!(adapter.written(), b"hello\n".to_vec());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (adapter, manager) = manager();
        manager.disconnect().await.unwrap();

        manager.connect(ADDR).await.unwrap();
        manager.disconnect().await.unwrap();
        manager.disconnect().await.unwrap();

        assert_eq!(adapter.close_count(), 1);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_paired_devices_need_permission() {
        let adapter = MockAdapter::new().with_devices(vec![BondedDevice {
            name: "MTP-II".to_string(),
            address: ADDR.to_string(),
        }]);
        let manager = ConnectionManager::new(adapter.clone(), ManagerConfig::default());

        assert_eq!(manager.list_paired_devices().await.len(), 1);
        adapter.set_permission(false);
        assert!(manager.list_paired_devices().await.is_empty());
    }

    #[tokio::test]
    async fn test_print_directive_keeps_slashes() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();

        let directive = PrintDirective {
            size: text::FontSize::clamped(2),
            text: "see http://x.io\n",
        };
        manager.print_directive(&directive).await.unwrap();
        assert!(adapter.written().ends_with(b"see http://x.io\n"));
    }

    #[tokio::test]
    async fn test_cancelled_write_keeps_connection() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();

        tokio::select! {
            biased;
            _ = manager.write(vec![b'x'; 1 << 20]) => {}
            _ = tokio::task::yield_now() => {}
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(manager.is_connected().await);
        assert_eq!(adapter.written().len(), 1 << 20);
        assert!(manager.probe().await);
    }

    #[tokio::test]
    async fn test_cancelled_write_failure_clears_later() {
        let (adapter, manager) = manager();
        manager.connect(ADDR).await.unwrap();
        adapter.set_fail_writes(true);

        let _ = tokio::time::timeout(Duration::ZERO, manager.write(b"lost".to_vec())).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!manager.is_connected().await);
        assert!(matches!(
            manager.write(b"x".to_vec()).await.unwrap_err(),
            PrinterError::NotConnected
        ));
    }

    #[tokio::test]
    async fn test_retry_after_timeout_waits_for_handshake() {
        let adapter = MockAdapter::new();
        adapter.set_open_delay(Duration::from_millis(300));
        let config = ManagerConfig {
            connect_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let manager = ConnectionManager::new(adapter.clone(), config);

        assert!(matches!(
            manager.connect(ADDR).await.unwrap_err(),
            PrinterError::Timeout(_)
        ));

        // A fast retry must not start a second handshake.
        adapter.set_open_delay(Duration::ZERO);
        assert!(matches!(
            manager.connect(ADDR).await.unwrap_err(),
            PrinterError::Timeout(_)
        ));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(manager.connect(ADDR).await.unwrap(), ConnectStatus::Connected);
        assert_eq!(adapter.open_count(), 1);
        assert!(manager.probe().await);
    }

    #[tokio::test]
    async fn test_disconnect_discards_late_handshake() {
        let adapter = MockAdapter::new();
        adapter.set_open_delay(Duration::from_millis(200));
        let config = ManagerConfig {
            connect_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let manager = ConnectionManager::new(adapter.clone(), config);

        assert!(manager.connect(ADDR).await.is_err());
        manager.disconnect().await.unwrap();

        adapter.set_open_delay(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!manager.is_connected().await);

        assert_eq!(manager.connect(ADDR).await.unwrap(), ConnectStatus::Connected);
        assert_eq!(adapter.open_count(), 2);
    }

    #[tokio::test]
    async fn test_late_handshake_for_other_address_is_dropped() {
        let adapter = MockAdapter::new();
        adapter.set_open_delay(Duration::from_millis(200));
        let config = ManagerConfig {
            connect_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let manager = ConnectionManager::new(adapter.clone(), config);

        assert!(manager.connect(ADDR).await.is_err());
        adapter.set_open_delay(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let other = "00:11:62:AA:BB:CC";
        assert_eq!(manager.connect(other).await.unwrap(), ConnectStatus::Connected);
        assert_eq!(adapter.open_count(), 2);
        assert_eq!(manager.connection_info().await.unwrap().address, other);
    }
}
