//! Session controller configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::{
    AdvertiseData, AdvertiseMode, AdvertiseSettings, ScanMode, ScanSettings, TxPowerLevel,
    SERVICE_UUID,
};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Radio parameters used by [`BleSessionController`](crate::BleSessionController)
///
/// Defaults reproduce the demo: low-latency scanning, low-latency connectable
/// advertising at high power, device name and TX power in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Scan duty cycle
    pub scan_mode: ScanMode,
    /// Advertising interval class
    pub advertise_mode: AdvertiseMode,
    /// Advertising transmit power
    pub tx_power: TxPowerLevel,
    /// Whether peers may connect to the advertisement
    pub connectable: bool,
    /// Put the adapter's name in the advertisement
    pub include_device_name: bool,
    /// Put the TX power level in the advertisement
    pub include_tx_power_level: bool,
    /// Stop advertising automatically after this many seconds
    pub advertise_timeout_secs: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::LowLatency,
            advertise_mode: AdvertiseMode::LowLatency,
            tx_power: TxPowerLevel::High,
            connectable: true,
            include_device_name: true,
            include_tx_power_level: true,
            advertise_timeout_secs: None,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan mode
    pub fn with_scan_mode(mut self, mode: ScanMode) -> Self {
        self.scan_mode = mode;
        self
    }

    /// Set advertise mode
    pub fn with_advertise_mode(mut self, mode: AdvertiseMode) -> Self {
        self.advertise_mode = mode;
        self
    }

    /// Set transmit power
    pub fn with_tx_power(mut self, level: TxPowerLevel) -> Self {
        self.tx_power = level;
        self
    }

    /// Enable or disable connectable advertising
    pub fn with_connectable(mut self, connectable: bool) -> Self {
        self.connectable = connectable;
        self
    }

    /// Enable or disable the device name in the advertisement
    pub fn with_device_name(mut self, include: bool) -> Self {
        self.include_device_name = include;
        self
    }

    /// Set advertising timeout
    pub fn with_advertise_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.advertise_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings::new(self.scan_mode)
    }

    pub fn advertise_settings(&self) -> AdvertiseSettings {
        AdvertiseSettings {
            mode: self.advertise_mode,
            tx_power: self.tx_power,
            connectable: self.connectable,
            timeout: self.advertise_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Main advertising payload announcing [`SERVICE_UUID`]
    pub fn advertise_data(&self) -> AdvertiseData {
        AdvertiseData {
            include_device_name: self.include_device_name,
            include_tx_power_level: self.include_tx_power_level,
            ..AdvertiseData::service_announcement(SERVICE_UUID)
        }
    }

    /// Scan response payload
    pub fn scan_response(&self) -> AdvertiseData {
        AdvertiseData {
            include_tx_power_level: self.include_tx_power_level,
            ..AdvertiseData::scan_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_payloads() {
        let config = ControllerConfig::default();
        assert_eq!(
            config.advertise_data(),
            AdvertiseData::service_announcement(SERVICE_UUID)
        );
        assert_eq!(config.scan_response(), AdvertiseData::scan_response());
        assert_eq!(config.advertise_settings(), AdvertiseSettings::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ControllerConfig::new()
            .with_scan_mode(ScanMode::Balanced)
            .with_tx_power(TxPowerLevel::Low)
            .with_connectable(false)
            .with_device_name(false)
            .with_advertise_timeout(Some(Duration::from_secs(30)));

        assert_eq!(config.scan_settings().mode, ScanMode::Balanced);
        let settings = config.advertise_settings();
        assert_eq!(settings.tx_power, TxPowerLevel::Low);
        assert!(!settings.connectable);
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert!(!config.advertise_data().include_device_name);
        assert_eq!(config.advertise_data().service_uuids, vec![SERVICE_UUID]);
    }
}
