//! Session events delivered on the log channel
//!
//! Events are structured; the human-readable log line is produced by the
//! [`Display`](std::fmt::Display) impl and only applied where text is shown.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BleError;
use crate::protocol::ScanResult;

/// Outcome reported by the session controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BleEvent {
    /// A scan was requested from the radio
    ScanStarted,
    /// An advertisement matching the scan filter was received
    DeviceDiscovered(ScanResult),
    /// A running scan was cancelled
    ScanStopped,
    /// Advertising was requested with the given service
    AdvertisingRequested { service_uuid: Uuid },
    /// The radio confirmed the advertisement is on air
    AdvertisingStarted,
    /// Advertising stop was requested
    AdvertisingStopped,
    /// An operation failed
    Failed { error: BleError },
}

/// Discriminant of [`BleEvent`], for counting and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ScanStarted,
    DeviceDiscovered,
    ScanStopped,
    AdvertisingRequested,
    AdvertisingStarted,
    AdvertisingStopped,
    Failed,
}

impl BleEvent {
    pub fn failed(error: BleError) -> Self {
        Self::Failed { error }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::ScanStarted => EventKind::ScanStarted,
            Self::DeviceDiscovered(_) => EventKind::DeviceDiscovered,
            Self::ScanStopped => EventKind::ScanStopped,
            Self::AdvertisingRequested { .. } => EventKind::AdvertisingRequested,
            Self::AdvertisingStarted => EventKind::AdvertisingStarted,
            Self::AdvertisingStopped => EventKind::AdvertisingStopped,
            Self::Failed { .. } => EventKind::Failed,
        }
    }

    /// The error carried by a failure event
    pub fn error(&self) -> Option<&BleError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for BleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanStarted => write!(f, "BLE: Started scanning for advertising devices..."),
            Self::DeviceDiscovered(result) => {
                write!(f, "Discovered: {} (RSSI: {})", result.display_name(), result.rssi)
            }
            Self::ScanStopped => write!(f, "BLE: Stopped scanning."),
            Self::AdvertisingRequested { service_uuid } => write!(
                f,
                "BLE: Starting advertising with Service UUID: {}",
                service_uuid
            ),
            Self::AdvertisingStarted => write!(f, "BLE: Advertising started successfully."),
            Self::AdvertisingStopped => write!(f, "BLE: Stopped advertising."),
            Self::Failed { error } => write!(f, "{}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanFailure;
    use crate::protocol::SERVICE_UUID;

    #[test]
    fn test_discovery_line_uses_placeholder() {
        let event = BleEvent::DeviceDiscovered(ScanResult::new("AA:BB", None, -67));
        assert_eq!(event.to_string(), "Discovered: Unknown (RSSI: -67)");
        assert_eq!(event.kind(), EventKind::DeviceDiscovered);
    }

    #[test]
    fn test_advertising_requested_mentions_uuid() {
        let event = BleEvent::AdvertisingRequested {
            service_uuid: SERVICE_UUID,
        };
        assert!(event
            .to_string()
            .ends_with("0000180d-0000-1000-8000-00805f9b34fb"));
    }

    #[test]
    fn test_failure_event_exposes_error() {
        let event = BleEvent::failed(BleError::ScanFailed(ScanFailure::InternalError));
        assert_eq!(event.kind(), EventKind::Failed);
        assert_eq!(
            event.error(),
            Some(&BleError::ScanFailed(ScanFailure::InternalError))
        );
        assert_eq!(event.to_string(), "Scan failed with error 3 (internal error)");
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(BleEvent::failed(BleError::AdapterDisabled)).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["error"]["kind"], "adapter_disabled");

        let json = serde_json::to_value(BleEvent::DeviceDiscovered(
            ScanResult::new("AA", Some("hr".into()), -50),
        ))
        .unwrap();
        assert_eq!(json["type"], "device_discovered");
        assert_eq!(json["rssi"], -50);
    }
}
