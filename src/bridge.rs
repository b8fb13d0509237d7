//! # Method-Call Bridge
//!
//! Dispatches named method calls from a host application onto the
//! connection manager, keeping the wire conventions existing callers rely
//! on:
//!
//! | Method | Argument | Result |
//! |--------|----------|--------|
//! | `getPlatformVersion` | - | version string |
//! | `getBatteryLevel` | - | 0–100, or error `UNAVAILABLE` |
//! | `BluetoothStatus` | - | `"true"` / `"false"` |
//! | `connectionStatus` | - | `"true"` / `"false"` (probes the link) |
//! | `connectPrinter` | address | `"true"` / `"false"`, or error `PERMISSION_DENIED` |
//! | `disconnectPrinter` | - | `"true"` / `"false"` |
//! | `writeBytes` | `[int]` | `"true"` / `"false"`, or error `INVALID_ARGUMENTS` |
//! | `printText` | `"<size>//<text>"` | `"true"` / `"false"` |
//! | `bluetothLinked` | - | `["name#address", ...]` |
//!
//! Booleans travel as the strings `"true"` and `"false"`. That is a
//! compatibility constraint of this boundary only; nothing inside the crate
//! uses it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::connection::ConnectionManager;
use crate::error::PrinterError;
use crate::platform::Platform;
use crate::transport::Adapter;

/// Shown to the user when a write finds the link dead.
pub const DISCONNECTED_NOTICE: &str = "Device was disconnected, reconnect";

/// An incoming call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// The answer to a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Value),
    Error { code: String, message: String },
    NotImplemented,
}

impl Reply {
    /// `"true"` / `"false"`.
    fn flag(ok: bool) -> Self {
        Reply::Success(Value::String(ok.to_string()))
    }

    fn error(err: &PrinterError, message: &str) -> Self {
        Reply::Error {
            code: err.code().to_string(),
            message: message.to_string(),
        }
    }
}

/// The bridge. Cheap to share behind an `Arc`.
pub struct Bridge<A: Adapter, P: Platform> {
    manager: Arc<ConnectionManager<A>>,
    platform: P,
}

impl<A: Adapter, P: Platform> Bridge<A, P> {
    pub fn new(manager: Arc<ConnectionManager<A>>, platform: P) -> Self {
        Self { manager, platform }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<A>> {
        &self.manager
    }

    /// Dispatch one call.
    pub async fn handle(&self, call: &MethodCall) -> Reply {
        debug!(method = %call.method, "bridge call");
        match call.method.as_str() {
            "getPlatformVersion" => Reply::Success(Value::String(self.platform.version())),
            "getBatteryLevel" => match self.platform.battery_level() {
                Some(level) => Reply::Success(Value::from(level)),
                None => Reply::error(
                    &PrinterError::Unavailable("battery".to_string()),
                    "Battery level not available.",
                ),
            },
            "BluetoothStatus" => Reply::flag(self.manager.is_adapter_enabled().await),
            "connectionStatus" => self.connection_status().await,
            "connectPrinter" => self.connect(&argument_string(&call.arguments)).await,
            "disconnectPrinter" => Reply::flag(self.manager.disconnect().await.is_ok()),
            "writeBytes" => self.write_bytes(&call.arguments).await,
            "printText" => {
                let result = self
                    .manager
                    .print_text(&argument_string(&call.arguments))
                    .await;
                self.write_outcome(result)
            }
            "bluetothLinked" => {
                let devices = self.manager.list_paired_devices().await;
                Reply::Success(Value::from(
                    devices.iter().map(|d| d.to_wire()).collect::<Vec<_>>(),
                ))
            }
            _ => Reply::NotImplemented,
        }
    }

    async fn connection_status(&self) -> Reply {
        if !self.manager.is_connected().await {
            return Reply::flag(false);
        }
        let alive = self.manager.probe().await;
        if !alive {
            self.platform.notify(DISCONNECTED_NOTICE);
        }
        Reply::flag(alive)
    }

    async fn connect(&self, address: &str) -> Reply {
        if address.is_empty() {
            return Reply::flag(false);
        }
        match self.manager.connect(address).await {
            Ok(_) => Reply::flag(true),
            Err(e @ PrinterError::PermissionDenied) => {
                Reply::error(&e, "Bluetooth permissions not granted")
            }
            Err(_) => Reply::flag(false),
        }
    }

    async fn write_bytes(&self, arguments: &Value) -> Reply {
        let values = match parse_byte_list(arguments) {
            Ok(values) => values,
            Err(e) => return Reply::error(&e, "Invalid byte array"),
        };
        let result = self.manager.write_raw(&values).await;
        self.write_outcome(result)
    }

    /// Map a write result onto the boolean wire value, notifying the user
    /// when the write found the link dead.
    fn write_outcome(&self, result: Result<(), PrinterError>) -> Reply {
        match result {
            Ok(()) => Reply::flag(true),
            Err(e) => {
                if e.is_transport() {
                    self.platform.notify(DISCONNECTED_NOTICE);
                }
                Reply::flag(false)
            }
        }
    }
}

/// String arguments pass through; anything else is rendered as JSON text.
///
/// A missing argument is the empty string rather than the text `null`, so
/// `printText` without an argument prints only the header.
fn argument_string(arguments: &Value) -> String {
    match arguments {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `writeBytes` payload: an array of integers, nothing else.
fn parse_byte_list(arguments: &Value) -> Result<Vec<i64>, PrinterError> {
    let items = arguments
        .as_array()
        .ok_or_else(|| PrinterError::InvalidArguments("expected a list".to_string()))?;
    items
        .iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| PrinterError::InvalidArguments(format!("not an integer: {}", v)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_byte_list() {
        assert_eq!(parse_byte_list(&json!([1, 2, 255])).unwrap(), vec![1, 2, 255]);
        assert_eq!(parse_byte_list(&json!([])).unwrap(), Vec::<i64>::new());
        assert!(parse_byte_list(&json!("1,2")).is_err());
        assert!(parse_byte_list(&json!([1, "2"])).is_err());
        assert!(parse_byte_list(&json!([1.5])).is_err());
        assert!(parse_byte_list(&Value::Null).is_err());
    }

    #[test]
    fn test_argument_string() {
        assert_eq!(argument_string(&json!("2//hi")), "2//hi");
        assert_eq!(argument_string(&Value::Null), "");
        assert_eq!(argument_string(&json!(42)), "42");
    }

    #[test]
    fn test_method_call_without_arguments() {
        let call: MethodCall = serde_json::from_str(r#"{"method":"BluetoothStatus"}"#).unwrap();
        assert_eq!(call.method, "BluetoothStatus");
        assert!(call.arguments.is_null());
    }
}
