//! Host platform queries that the bridge exposes next to the printer calls.

use std::fs;
use std::path::Path;

use tracing::warn;

pub trait Platform: Send + Sync + 'static {
    /// Human-readable OS name and version.
    fn version(&self) -> String;

    /// Battery charge in percent, or `None` when there is no battery.
    fn battery_level(&self) -> Option<u8>;

    /// Show a short message to the user.
    fn notify(&self, message: &str);
}

const OS_RELEASE: &str = "/proc/sys/kernel/osrelease";
const POWER_SUPPLY: &str = "/sys/class/power_supply";

/// Reads `/proc` and `/sys`; notifications go to the log.
#[derive(Debug, Default, Clone)]
pub struct LinuxPlatform;

impl Platform for LinuxPlatform {
    fn version(&self) -> String {
        let release = fs::read_to_string(OS_RELEASE).unwrap_or_default();
        format!("Linux {}", release.trim())
    }

    fn battery_level(&self) -> Option<u8> {
        let entries = fs::read_dir(POWER_SUPPLY).ok()?;
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("BAT"))
            .find_map(|e| read_capacity(&e.path()))
    }

    fn notify(&self, message: &str) {
        warn!("{}", message);
    }
}

fn read_capacity(dir: &Path) -> Option<u8> {
    let raw = fs::read_to_string(dir.join("capacity")).ok()?;
    parse_capacity(&raw)
}

fn parse_capacity(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|n| *n <= 100)
}
