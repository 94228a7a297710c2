//! BLE constants, scan/advertise settings and advertising payloads

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AdvertiseFailure;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Service UUID used both as the scan filter and as the advertised service.
///
/// Scanner and advertiser must agree on it for the demo to discover itself.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180D_0000_1000_8000_00805F9B34FB);

/// Name reported for peers that do not advertise one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// Name of the single event channel carrying log events to the UI
pub const LOG_EVENT_NAME: &str = "bleLog";

/// Maximum size of a legacy advertising or scan response payload
pub const MAX_LEGACY_PAYLOAD: usize = 31;

/// Lower 96 bits of the Bluetooth base UUID (0000xxxx-0000-1000-8000-00805F9B34FB)
const BASE_UUID_LOW_BITS: u128 = 0x0000_1000_8000_00805F9B34FB;

// AD structure types (Core Specification Supplement, part A)
const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;
const AD_TYPE_UUID128_COMPLETE: u8 = 0x07;
const AD_TYPE_LOCAL_NAME_COMPLETE: u8 = 0x09;
const AD_TYPE_TX_POWER: u8 = 0x0A;

/// LE General Discoverable, BR/EDR not supported
const AD_FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Return the 16-bit alias of `uuid` if it lies on the Bluetooth base UUID
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let high = value >> 96;
    if value & ((1u128 << 96) - 1) == BASE_UUID_LOW_BITS && high <= u16::MAX as u128 {
        Some(high as u16)
    } else {
        None
    }
}

// ----------------------------------------------------------------------------
// Scanning
// ----------------------------------------------------------------------------

/// Scan duty cycle requested from the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    LowPower,
    Balanced,
    /// Active scanning with the highest duty cycle
    #[default]
    LowLatency,
}

/// Settings applied when a scan starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSettings {
    pub mode: ScanMode,
}

impl ScanSettings {
    pub fn new(mode: ScanMode) -> Self {
        Self { mode }
    }
}

/// Result filter installed with a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanFilter {
    /// Only report advertisements carrying this service UUID
    pub service_uuid: Option<Uuid>,
}

impl ScanFilter {
    /// Filter restricted to a single service
    pub fn service(uuid: Uuid) -> Self {
        Self {
            service_uuid: Some(uuid),
        }
    }

    /// Check whether a result passes this filter
    pub fn matches(&self, result: &ScanResult) -> bool {
        match self.service_uuid {
            Some(uuid) => result.service_uuids.contains(&uuid),
            None => true,
        }
    }
}

/// A single advertisement observed while scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Platform address or peripheral identifier
    pub address: String,
    /// Advertised local name, if any
    pub name: Option<String>,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Service UUIDs carried by the advertisement
    #[serde(default)]
    pub service_uuids: Vec<Uuid>,
}

impl ScanResult {
    pub fn new(address: impl Into<String>, name: Option<String>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
            service_uuids: Vec::new(),
        }
    }

    pub fn with_service(mut self, uuid: Uuid) -> Self {
        self.service_uuids.push(uuid);
        self
    }

    /// Advertised name, or the placeholder when the peer sent none
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }
}

// ----------------------------------------------------------------------------
// Advertising
// ----------------------------------------------------------------------------

/// Advertising interval class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertiseMode {
    LowPower,
    Balanced,
    #[default]
    LowLatency,
}

impl AdvertiseMode {
    /// Nominal advertising interval for this mode
    pub fn interval(&self) -> Duration {
        match self {
            AdvertiseMode::LowPower => Duration::from_millis(1000),
            AdvertiseMode::Balanced => Duration::from_millis(250),
            AdvertiseMode::LowLatency => Duration::from_millis(100),
        }
    }
}

/// Transmit power class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPowerLevel {
    UltraLow,
    Low,
    Medium,
    #[default]
    High,
}

impl TxPowerLevel {
    /// Nominal output power in dBm
    pub fn dbm(&self) -> i8 {
        match self {
            TxPowerLevel::UltraLow => -21,
            TxPowerLevel::Low => -15,
            TxPowerLevel::Medium => -7,
            TxPowerLevel::High => 1,
        }
    }
}

/// Settings applied when advertising starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiseSettings {
    pub mode: AdvertiseMode,
    pub tx_power: TxPowerLevel,
    pub connectable: bool,
    /// Stop automatically after this long; `None` advertises until stopped
    pub timeout: Option<Duration>,
}

impl Default for AdvertiseSettings {
    fn default() -> Self {
        Self {
            mode: AdvertiseMode::LowLatency,
            tx_power: TxPowerLevel::High,
            connectable: true,
            timeout: None,
        }
    }
}

/// Content of an advertising or scan response payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertiseData {
    pub include_device_name: bool,
    pub service_uuids: Vec<Uuid>,
    pub include_tx_power_level: bool,
}

impl AdvertiseData {
    /// Main advertisement: device name, the given service and TX power
    pub fn service_announcement(service_uuid: Uuid) -> Self {
        Self {
            include_device_name: true,
            service_uuids: vec![service_uuid],
            include_tx_power_level: true,
        }
    }

    /// Scan response carrying only the TX power level
    pub fn scan_response() -> Self {
        Self {
            include_device_name: false,
            service_uuids: Vec::new(),
            include_tx_power_level: true,
        }
    }

    /// Encode as legacy AD structures.
    ///
    /// `include_flags` adds the discoverability flags that connectable
    /// advertisements carry in the main payload; scan responses never have them.
    /// Fails with [`AdvertiseFailure::DataTooLarge`] past 31 bytes.
    pub fn encode(
        &self,
        device_name: &str,
        tx_power: TxPowerLevel,
        include_flags: bool,
    ) -> Result<Vec<u8>, AdvertiseFailure> {
        let mut payload = Vec::with_capacity(MAX_LEGACY_PAYLOAD);

        if include_flags {
            push_ad_structure(&mut payload, AD_TYPE_FLAGS, &[AD_FLAGS_GENERAL_DISCOVERABLE]);
        }

        if self.include_device_name {
            push_ad_structure(&mut payload, AD_TYPE_LOCAL_NAME_COMPLETE, device_name.as_bytes());
        }

        let (short, long): (Vec<_>, Vec<_>) = self
            .service_uuids
            .iter()
            .partition(|uuid| short_uuid(uuid).is_some());

        if !short.is_empty() {
            let data: Vec<u8> = short
                .iter()
                .filter_map(|uuid| short_uuid(uuid))
                .flat_map(u16::to_le_bytes)
                .collect();
            push_ad_structure(&mut payload, AD_TYPE_UUID16_COMPLETE, &data);
        }

        if !long.is_empty() {
            let data: Vec<u8> = long
                .iter()
                .flat_map(|uuid| uuid.as_bytes().iter().rev().copied())
                .collect();
            push_ad_structure(&mut payload, AD_TYPE_UUID128_COMPLETE, &data);
        }

        if self.include_tx_power_level {
            push_ad_structure(&mut payload, AD_TYPE_TX_POWER, &[tx_power.dbm() as u8]);
        }

        if payload.len() > MAX_LEGACY_PAYLOAD {
            return Err(AdvertiseFailure::DataTooLarge);
        }
        Ok(payload)
    }
}

fn push_ad_structure(payload: &mut Vec<u8>, ad_type: u8, data: &[u8]) {
    // Length byte covers the type byte plus data; oversize names are caught by the caller.
    payload.push((data.len() + 1).min(u8::MAX as usize) as u8);
    payload.push(ad_type);
    payload.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_uuid_is_heart_rate_alias() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(short_uuid(&SERVICE_UUID), Some(0x180D));
    }

    #[test]
    fn test_short_uuid_rejects_custom_uuid() {
        let custom = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);
        assert_eq!(short_uuid(&custom), None);
    }

    #[test]
    fn test_service_announcement_layout() {
        let data = AdvertiseData::service_announcement(SERVICE_UUID);
        let payload = data.encode("Pixel", TxPowerLevel::High, true).unwrap();

        assert_eq!(
            payload,
            vec![
                0x02, 0x01, 0x06, // flags
                0x06, 0x09, b'P', b'i', b'x', b'e', b'l', // name
                0x03, 0x03, 0x0D, 0x18, // 16-bit service list
                0x02, 0x0A, 0x01, // tx power
            ]
        );
    }

    #[test]
    fn test_scan_response_carries_only_tx_power() {
        let payload = AdvertiseData::scan_response()
            .encode("ignored", TxPowerLevel::Low, false)
            .unwrap();
        assert_eq!(payload, vec![0x02, 0x0A, (-15i8) as u8]);
    }

    #[test]
    fn test_long_name_is_data_too_large() {
        let data = AdvertiseData::service_announcement(SERVICE_UUID);
        assert!(data.encode(&"n".repeat(19), TxPowerLevel::High, true).is_ok());
        assert_eq!(
            data.encode(&"n".repeat(20), TxPowerLevel::High, true),
            Err(AdvertiseFailure::DataTooLarge)
        );
    }

    #[test]
    fn test_custom_uuid_uses_128_bit_list() {
        let custom = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);
        let data = AdvertiseData {
            include_device_name: false,
            service_uuids: vec![custom],
            include_tx_power_level: false,
        };
        let payload = data.encode("", TxPowerLevel::High, false).unwrap();
        assert_eq!(payload[0], 17);
        assert_eq!(payload[1], AD_TYPE_UUID128_COMPLETE);
        assert_eq!(payload[2], 0x9E);
        assert_eq!(payload[17], 0x6E);
    }

    #[test]
    fn test_scan_filter_matches_service() {
        let filter = ScanFilter::service(SERVICE_UUID);
        let hit = ScanResult::new("AA", None, -40).with_service(SERVICE_UUID);
        let miss = ScanResult::new("BB", None, -40);

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
        assert!(ScanFilter::default().matches(&miss));
    }

    #[test]
    fn test_display_name_placeholder() {
        assert_eq!(ScanResult::new("AA", None, -1).display_name(), "Unknown");
        assert_eq!(
            ScanResult::new("AA", Some("hr".into()), -1).display_name(),
            "hr"
        );
    }

    #[test]
    fn test_default_settings_match_demo() {
        let settings = AdvertiseSettings::default();
        assert_eq!(settings.mode, AdvertiseMode::LowLatency);
        assert_eq!(settings.tx_power, TxPowerLevel::High);
        assert!(settings.connectable);
        assert_eq!(ScanSettings::default().mode, ScanMode::LowLatency);
    }
}
