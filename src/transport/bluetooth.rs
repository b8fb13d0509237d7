//! # Bluetooth RFCOMM Transport (BlueZ)
//!
//! This module drives a printer over the Bluetooth Serial Port Profile on
//! Linux, using the BlueZ command line tools and the kernel's RFCOMM TTY
//! devices.
//!
//! ## How a Connection Is Opened
//!
//! 1. `bluetoothctl scan off` stops any inquiry in progress
//! 2. `/proc/net/rfcomm` (or `rfcomm -a`) is searched for an existing
//!    binding to the printer's address
//! 3. Otherwise the service record is looked up with `sdptool search` to
//!    find its RFCOMM channel (falling back to the configured channel) and
//!    `rfcomm bind <N> <MAC> <channel>` creates `/dev/rfcommN`
//!    (**requires root**)
//! 4. The device node is opened write-only and switched to raw TTY mode
//!
//! Pairing is out of scope: the printer must already be bonded, e.g. with
//! `bluetoothctl pair XX:XX:XX:XX:XX:XX`.
//!
//! ## Platforms
//!
//! Only Linux ships BlueZ and RFCOMM TTYs. On other Unix systems the
//! lookups simply find nothing; on non-Unix targets the TTY and permission
//! helpers are no-ops so the crate (and the mock) still build.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Adapter, BondedDevice, Sink};
use crate::config::ManagerConfig;
use crate::error::PrinterError;

/// Kernel table of bound RFCOMM devices.
const PROC_RFCOMM: &str = "/proc/net/rfcomm";

/// Highest `/dev/rfcommN` index tried when binding.
const MAX_RFCOMM_DEVICES: u8 = 32;

/// # BlueZ Adapter
///
/// The default local adapter as seen by `bluetoothctl`.
///
/// ## Example
///
/// ```no_run
/// use std::io::Write;
/// use btprinter::config::{ManagerConfig, SPP_UUID};
/// use btprinter::transport::{Adapter, BluezAdapter};
///
/// let adapter = BluezAdapter::new(ManagerConfig::default());
/// if adapter.is_enabled() {
///     for device in adapter.bonded_devices()? {
///         println!("{} {}", device.address, device.name);
///     }
/// }
/// let mut sink = adapter.open_rfcomm("00:11:62:AA:BB:CC", SPP_UUID)?;
/// sink.write_all(b"hello\n")?;
/// # Ok::<(), btprinter::PrinterError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BluezAdapter {
    config: ManagerConfig,
}

impl BluezAdapter {
    pub fn new(config: ManagerConfig) -> Self {
        Self { config }
    }
}

impl Adapter for BluezAdapter {
    fn is_enabled(&self) -> bool {
        match bluetoothctl(&["show"]) {
            Ok(stdout) => parse_powered(&stdout),
            Err(e) => {
                debug!("bluetoothctl show failed: {}", e);
                false
            }
        }
    }

    fn has_permission(&self) -> bool {
        // rfcomm bind needs root; without it we can only use nodes that
        // someone already bound and made writable for us.
        if is_root() {
            return true;
        }
        (0..MAX_RFCOMM_DEVICES)
            .map(|i| format!("/dev/rfcomm{}", i))
            .any(|path| is_writable(&path))
    }

    fn bonded_devices(&self) -> Result<Vec<BondedDevice>, PrinterError> {
        // BlueZ >= 5.65 spells it `devices Paired`, older releases `paired-devices`.
        let stdout = match bluetoothctl(&["devices", "Paired"]) {
            Ok(out) if !out.trim().is_empty() => out,
            _ => bluetoothctl(&["paired-devices"])?,
        };
        Ok(parse_paired_devices(&stdout))
    }

    fn cancel_discovery(&self) -> Result<(), PrinterError> {
        bluetoothctl(&["scan", "off"]).map(|_| ())
    }

    fn open_rfcomm(&self, address: &str, service: Uuid) -> Result<Box<dyn Sink>, PrinterError> {
        debug!(%service, "opening RFCOMM link to {}", address);

        let device = match find_rfcomm_for_mac(address)? {
            Some(device) => {
                debug!("reusing {} for {}", device, address);
                device
            }
            None => {
                let channel = resolve_channel(address, service).unwrap_or_else(|| {
                    debug!(
                        "No SDP record for {}, using channel {}",
                        service, self.config.rfcomm_channel
                    );
                    self.config.rfcomm_channel
                });
                setup_rfcomm(address, channel)?
            }
        };

        let sink = RfcommSink::open(&device, &self.config)?;
        info!("Connected to {} via {}", address, device);
        Ok(Box::new(sink))
    }
}

/// Run `bluetoothctl` with the given arguments and return stdout.
fn bluetoothctl(args: &[&str]) -> Result<String, PrinterError> {
    let output = Command::new("bluetoothctl")
        .args(args)
        .output()
        .map_err(|e| PrinterError::Transport(format!("Failed to run bluetoothctl: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PrinterError::Transport(format!(
            "bluetoothctl {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

#[cfg(unix)]
fn is_writable(path: &str) -> bool {
    let Ok(c_path) = std::ffi::CString::new(path) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable(path: &str) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| !meta.permissions().readonly())
}

/// `Powered: yes` in `bluetoothctl show` output.
fn parse_powered(stdout: &str) -> bool {
    stdout.lines().any(|line| {
        let line = line.trim();
        line.strip_prefix("Powered:")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"))
    })
}

/// Parse `Device XX:XX:XX:XX:XX:XX Some Name` lines.
///
/// A device without a name is reported under its address, as BlueZ does.
fn parse_paired_devices(stdout: &str) -> Vec<BondedDevice> {
    stdout
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("Device ")?;
            let (address, name) = match rest.split_once(' ') {
                Some((address, name)) => (address, name.trim()),
                None => (rest, ""),
            };
            if !super::is_valid_mac(address) {
                return None;
            }
            let name = if name.is_empty() { address } else { name };
            Some(BondedDevice {
                name: name.to_string(),
                address: address.to_uppercase(),
            })
        })
        .collect()
}

/// Device names bound to `mac` in `/proc/net/rfcomm`-style output
/// (`rfcomm0: XX:XX:XX:XX:XX:XX channel N clean`), in table order.
fn parse_rfcomm_table(contents: &str, mac: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let bound = rest.split_whitespace().next()?;
            let name = name.trim();
            (!name.is_empty() && bound.eq_ignore_ascii_case(mac)).then(|| name.to_string())
        })
        .collect()
}

/// First `Channel: N` in `sdptool search` output.
fn parse_sdp_channel(stdout: &str) -> Option<u8> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Channel:")
            .and_then(|n| n.trim().parse().ok())
    })
}

/// `sdptool` takes Bluetooth base UUIDs in their 16-bit form.
fn sdp_service_arg(service: Uuid) -> String {
    const BASE_MASK: u128 = !(0xFFFF_u128 << 96);
    const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

    let value = service.as_u128();
    if value & BASE_MASK == BASE {
        format!("0x{:04X}", value >> 96)
    } else {
        service.to_string()
    }
}

/// Ask the printer's SDP server which RFCOMM channel carries `service`.
fn resolve_channel(mac: &str, service: Uuid) -> Option<u8> {
    let output = Command::new("sdptool")
        .args(["search", "--bdaddr", mac, &sdp_service_arg(service)])
        .output()
        .map_err(|e| debug!("Failed to run sdptool: {}", e))
        .ok()?;
    parse_sdp_channel(&String::from_utf8_lossy(&output.stdout))
}

// ============================================================================
// RFCOMM SETUP HELPERS
// ============================================================================

/// First binding of `mac` in the table whose `/dev` node still exists.
fn first_existing(table: &str, mac: &str) -> Option<String> {
    parse_rfcomm_table(table, mac).into_iter().find_map(|name| {
        let device_path = format!("/dev/{}", name);
        Path::new(&device_path).exists().then_some(device_path)
    })
}

/// Find an existing RFCOMM device bound to the given MAC address.
///
/// Checks `/proc/net/rfcomm` and falls back to `rfcomm -a` command.
/// Returns the device path (e.g., "/dev/rfcomm0") if found.
#[cfg(unix)]
pub fn find_rfcomm_for_mac(mac: &str) -> Result<Option<String>, PrinterError> {
    if let Ok(contents) = std::fs::read_to_string(PROC_RFCOMM) {
        if let Some(path) = first_existing(&contents, mac) {
            return Ok(Some(path));
        }
    }

    let output = Command::new("rfcomm")
        .arg("-a")
        .output()
        .map_err(|e| PrinterError::Transport(format!("Failed to run 'rfcomm -a': {}", e)))?;

    Ok(first_existing(&String::from_utf8_lossy(&output.stdout), mac))
}

#[cfg(not(unix))]
pub fn find_rfcomm_for_mac(_mac: &str) -> Result<Option<String>, PrinterError> {
    Ok(None)
}

/// Bind the first free `/dev/rfcommN` to `mac` on the given RFCOMM channel.
///
/// Runs:
/// 1. `l2ping -c 1 <MAC>` - verify the device is reachable
/// 2. `rfcomm bind <N> <MAC> <channel>` - create /dev/rfcommN
///
/// **Requires root privileges** for `rfcomm bind`.
#[cfg(unix)]
pub fn setup_rfcomm(mac: &str, channel: u8) -> Result<String, PrinterError> {
    let mac_upper = mac.to_uppercase();

    let index = (0..MAX_RFCOMM_DEVICES)
        .find(|i| !Path::new(&format!("/dev/rfcomm{}", i)).exists())
        .ok_or_else(|| PrinterError::Transport("No free rfcomm device".to_string()))?;
    let device_path = format!("/dev/rfcomm{}", index);

    debug!("Verifying connectivity to {}...", mac_upper);
    let output = Command::new("l2ping")
        .arg("-c")
        .arg("1")
        .arg(&mac_upper)
        .output()
        .map_err(|e| PrinterError::Transport(format!("Failed to run l2ping: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PrinterError::Transport(format!(
            "Device {} not reachable: {}",
            mac_upper,
            stderr.trim()
        )));
    }

    debug!("Binding rfcomm{} to {} channel {}", index, mac_upper, channel);
    let output = Command::new("rfcomm")
        .arg("bind")
        .arg(index.to_string())
        .arg(&mac_upper)
        .arg(channel.to_string())
        .output()
        .map_err(|e| PrinterError::Transport(format!("Failed to run rfcomm bind: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Permission denied") || stderr.contains("Operation not permitted") {
            return Err(PrinterError::PermissionDenied);
        }
        return Err(PrinterError::Transport(format!(
            "rfcomm bind failed: {}",
            stderr.trim()
        )));
    }

    // udev needs a moment to create the node
    thread::sleep(Duration::from_millis(500));

    if !Path::new(&device_path).exists() {
        return Err(PrinterError::Transport(format!(
            "Device {} was not created",
            device_path
        )));
    }

    info!("Created {}", device_path);
    Ok(device_path)
}

#[cfg(not(unix))]
pub fn setup_rfcomm(mac: &str, _channel: u8) -> Result<String, PrinterError> {
    Err(PrinterError::Unavailable(format!(
        "Cannot bind {}: RFCOMM TTYs need BlueZ",
        mac
    )))
}

// ============================================================================
// SINK
// ============================================================================

/// Open `/dev/rfcommN` as a raw, chunked byte sink.
///
/// The kernel establishes the RFCOMM link when the node is opened, so the
/// open itself is the blocking socket handshake.
pub struct RfcommSink {
    file: File,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl RfcommSink {
    pub fn open<P: AsRef<Path>>(device: P, config: &ManagerConfig) -> Result<Self, PrinterError> {
        let path = device.as_ref();

        let file = OpenOptions::new().write(true).open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                PrinterError::PermissionDenied
            } else {
                PrinterError::Transport(format!("Failed to open {}: {}", path.display(), e))
            }
        })?;

        configure_tty_raw(&file)?;

        Ok(Self {
            file,
            chunk_size: config.chunk_size.max(1),
            chunk_delay: config.chunk_delay,
        })
    }
}

impl Write for RfcommSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    /// Small writes are sent directly. Large writes are chunked so the
    /// Bluetooth buffer does not overflow.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if data.len() <= self.chunk_size {
            return self.file.write_all(data);
        }
        for chunk in data.chunks(self.chunk_size) {
            self.file.write_all(chunk)?;
            if !self.chunk_delay.is_zero() {
                thread::sleep(self.chunk_delay);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Sink for RfcommSink {
    fn close(&mut self) -> io::Result<()> {
        self.file.flush()?;
        // Closing before the output queue is empty can drop the tail of a
        // print job.
        if let Err(e) = drain(&self.file) {
            warn!("tcdrain failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn drain(file: &File) -> io::Result<()> {
    if unsafe { libc::tcdrain(file.as_raw_fd()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn drain(_file: &File) -> io::Result<()> {
    Ok(())
}

/// Put the RFCOMM TTY into raw 8-bit mode so every byte reaches the
/// printer untouched.
///
/// `cfmakeraw` leaves IXOFF and IXANY alone; they are cleared too because
/// 0x11 and 0x13 (XON/XOFF) occur in size selectors and raw passthrough.
#[cfg(unix)]
fn configure_tty_raw(file: &File) -> Result<(), PrinterError> {
    let fd = file.as_raw_fd();
    let tty_error = |call: &str| {
        PrinterError::Transport(format!("{} failed: {}", call, io::Error::last_os_error()))
    };

    let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut attrs) } != 0 {
        return Err(tty_error("tcgetattr"));
    }

    unsafe { libc::cfmakeraw(&mut attrs) };
    attrs.c_iflag &= !(libc::IXOFF | libc::IXANY);

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &attrs) } != 0 {
        return Err(tty_error("tcsetattr"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn configure_tty_raw(_file: &File) -> Result<(), PrinterError> {
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_powered() {
        let show = "Controller 00:1A:7D:DA:71:13 (public)\n\
                    \tName: laptop\n\
                    \tPowered: yes\n\
                    \tDiscoverable: no\n";
        assert!(parse_powered(show));
        assert!(!parse_powered("\tPowered: no\n"));
        assert!(!parse_powered(""));
    }

    #[test]
    fn test_parse_paired_devices() {
        let out = "Device 66:22:B3:0A:11:9C MTP-II\n\
                   Device 00:11:62:aa:bb:cc Star Micronics TSP650II\n\
                   Device 11:22:33:44:55:66\n\
                   [CHG] Controller 00:1A:7D:DA:71:13 Discovering: no\n\
                   Device not-a-mac Junk\n";
        let devices = parse_paired_devices(out);
        assert_eq!(
            devices,
            vec![
                BondedDevice {
                    name: "MTP-II".to_string(),
                    address: "66:22:B3:0A:11:9C".to_string(),
                },
                BondedDevice {
                    name: "Star Micronics TSP650II".to_string(),
                    address: "00:11:62:AA:BB:CC".to_string(),
                },
                BondedDevice {
                    name: "11:22:33:44:55:66".to_string(),
                    address: "11:22:33:44:55:66".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_rfcomm_table() {
        let table = "rfcomm0: 00:11:62:AA:BB:CC channel 1 clean\n\
                     rfcomm1: 66:22:B3:0A:11:9C channel 1 connected [tty-attached]\n\
                     rfcomm4: 66:22:B3:0A:11:9C channel 2 clean\n";
        assert_eq!(
            parse_rfcomm_table(table, "66:22:b3:0a:11:9c"),
            vec!["rfcomm1".to_string(), "rfcomm4".to_string()]
        );
        assert_eq!(
            parse_rfcomm_table(table, "00:11:62:AA:BB:CC"),
            vec!["rfcomm0".to_string()]
        );
        assert!(parse_rfcomm_table(table, "99:99:99:99:99:99").is_empty());
        assert!(parse_rfcomm_table("", "00:11:62:AA:BB:CC").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_binding_is_skipped() {
        // The first node is gone; the later binding still resolves.
        let table = "btprinter-missing0: 66:22:B3:0A:11:9C channel 1 clean\n\
                     null: 66:22:B3:0A:11:9C channel 1 clean\n";
        assert_eq!(
            first_existing(table, "66:22:B3:0A:11:9C"),
            Some("/dev/null".to_string())
        );
        assert_eq!(first_existing(table, "00:11:62:AA:BB:CC"), None);
    }

    #[test]
    fn test_parse_sdp_channel() {
        let out = "Searching for 0x1101 on 66:22:B3:0A:11:9C ...\n\
                   Service Name: SerialPort\n\
                   Service RecHandle: 0x10000\n\
                   Service Class ID List:\n  \"Serial Port\" (0x1101)\n\
                   Protocol Descriptor List:\n  \"L2CAP\" (0x0100)\n\
                     \"RFCOMM\" (0x0003)\n    Channel: 3\n";
        assert_eq!(parse_sdp_channel(out), Some(3));
        assert_eq!(parse_sdp_channel("Failed to connect to SDP server\n"), None);
    }

    #[test]
    fn test_sdp_service_arg() {
        assert_eq!(sdp_service_arg(crate::config::SPP_UUID), "0x1101");
        let vendor = Uuid::from_u128(0xE7810A71_73AE_499D_8C15_FAA9AEF0C3F2);
        assert_eq!(sdp_service_arg(vendor), "e7810a71-73ae-499d-8c15-faa9aef0c3f2");
    }

    // Opening real links requires hardware; the manager tests use MockAdapter.
}
