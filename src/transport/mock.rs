//! # Mock Transport
//!
//! An in-memory [`Adapter`] that records every byte written through its
//! sinks. Used by the test suite and by the CLI's `--dry-run` mode.
//!
//! Clones share state, so a test can keep a handle while the connection
//! manager owns another.
//!
//! ```
//! use std::io::Write;
//! use btprinter::transport::{Adapter, MockAdapter};
//! use btprinter::config::SPP_UUID;
//!
//! let adapter = MockAdapter::new();
//! let mut sink = adapter.open_rfcomm("00:11:22:33:44:55", SPP_UUID)?;
//! sink.write_all(b"hi")?;
//! assert_eq!(adapter.written(), b"hi");
//! # Ok::<(), btprinter::PrinterError>(())
//! ```

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use super::{Adapter, BondedDevice, Sink};
use crate::error::PrinterError;

#[derive(Debug, Default)]
struct MockState {
    enabled: bool,
    permission: bool,
    devices: Vec<BondedDevice>,
    fail_open: bool,
    fail_writes: bool,
    open_delay: Duration,
    written: Vec<u8>,
    opens: usize,
    closes: usize,
    discovery_cancels: usize,
    last_address: Option<String>,
}

/// In-memory Bluetooth adapter.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    /// Powered, permitted, no bonded devices.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                enabled: true,
                permission: true,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_devices(self, devices: Vec<BondedDevice>) -> Self {
        self.lock().devices = devices;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn set_permission(&self, permission: bool) {
        self.lock().permission = permission;
    }

    /// Make the next socket opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Make every write on every sink fail, as if the printer went away.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Block inside `open_rfcomm` for this long.
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    /// All bytes written so far, across sinks.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Return and clear the recorded bytes.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().written)
    }

    /// Number of sockets opened successfully.
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Number of sinks closed explicitly.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    pub fn discovery_cancels(&self) -> usize {
        self.lock().discovery_cancels
    }

    /// Address of the most recent open attempt.
    pub fn last_address(&self) -> Option<String> {
        self.lock().last_address.clone()
    }
}

impl Adapter for MockAdapter {
    fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    fn has_permission(&self) -> bool {
        self.lock().permission
    }

    fn bonded_devices(&self) -> Result<Vec<BondedDevice>, PrinterError> {
        Ok(self.lock().devices.clone())
    }

    fn cancel_discovery(&self) -> Result<(), PrinterError> {
        self.lock().discovery_cancels += 1;
        Ok(())
    }

    fn open_rfcomm(&self, address: &str, _service: Uuid) -> Result<Box<dyn Sink>, PrinterError> {
        let delay = {
            let mut st = self.lock();
            st.last_address = Some(address.to_string());
            st.open_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut st = self.lock();
        if st.fail_open {
            return Err(PrinterError::Transport(format!(
                "Connection refused by {}",
                address
            )));
        }
        st.opens += 1;
        Ok(Box::new(MockSink {
            state: self.state.clone(),
        }))
    }
}

struct MockSink {
    state: Arc<Mutex<MockState>>,
}

impl MockSink {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Write for MockSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut st = self.lock();
        if st.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"));
        }
        st.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.lock().fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"));
        }
        Ok(())
    }
}

impl Sink for MockSink {
    fn close(&mut self) -> io::Result<()> {
        self.lock().closes += 1;
        Ok(())
    }
}
