//! Linux BLE advertising implementation using bluer (BlueZ)

use std::collections::BTreeSet;

use bleloop_core::{AdvertiseCallback, AdvertiseData, AdvertiseSettings, BleAdvertiser};
use bluer::adv::{Advertisement, AdvertisementHandle, Feature, Type};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::advertise_failure;

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

/// Advertiser registering LE advertisements with BlueZ.
///
/// BlueZ lays out the scan response itself, so TX power requested by either
/// payload becomes a system include.
pub struct LinuxAdvertiser {
    adapter: bluer::Adapter,
    handle: Mutex<Option<AdvertisementHandle>>,
}

impl LinuxAdvertiser {
    pub fn new(adapter: bluer::Adapter) -> Self {
        Self {
            adapter,
            handle: Mutex::new(None),
        }
    }

    /// Whether the adapter exposes LE advertising instances at all
    pub async fn is_supported(adapter: &bluer::Adapter) -> bool {
        match adapter.supported_advertising_instances().await {
            Ok(instances) => instances > 0,
            Err(e) => {
                debug!("No LE advertising manager on {}: {}", adapter.name(), e);
                false
            }
        }
    }

    async fn local_name(&self) -> Option<String> {
        match self.adapter.alias().await {
            Ok(alias) => Some(alias),
            Err(e) => {
                warn!("Failed to read adapter alias: {}", e);
                None
            }
        }
    }
}

/// Translate the requested payloads and settings into a BlueZ advertisement
pub fn build_advertisement(
    settings: &AdvertiseSettings,
    data: &AdvertiseData,
    scan_response: &AdvertiseData,
    local_name: Option<String>,
) -> Advertisement {
    let mut system_includes = BTreeSet::new();
    if data.include_tx_power_level || scan_response.include_tx_power_level {
        system_includes.insert(Feature::TxPower);
    }

    let interval = settings.mode.interval();

    Advertisement {
        advertisement_type: if settings.connectable {
            Type::Peripheral
        } else {
            Type::Broadcast
        },
        service_uuids: data.service_uuids.iter().copied().collect(),
        local_name: if data.include_device_name {
            local_name
        } else {
            None
        },
        system_includes,
        discoverable: Some(true),
        min_interval: Some(interval),
        max_interval: Some(interval),
        tx_power: Some(settings.tx_power.dbm() as i16),
        timeout: settings.timeout,
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl BleAdvertiser for LinuxAdvertiser {
    async fn start_advertising(
        &self,
        settings: AdvertiseSettings,
        data: AdvertiseData,
        scan_response: AdvertiseData,
        callback: AdvertiseCallback,
    ) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            callback.on_start_failure(bleloop_core::AdvertiseFailure::AlreadyStarted);
            return;
        }

        let local_name = if data.include_device_name {
            self.local_name().await
        } else {
            None
        };
        let advertisement = build_advertisement(&settings, &data, &scan_response, local_name);

        match self.adapter.advertise(advertisement).await {
            Ok(registered) => {
                *handle = Some(registered);
                info!("Started BLE advertising on {}", self.adapter.name());
                callback.on_start_success(settings);
            }
            Err(e) => {
                warn!("Failed to start advertising: {}", e);
                callback.on_start_failure(advertise_failure(&e));
            }
        }
    }

    async fn stop_advertising(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            drop(handle); // Dropping the handle unregisters the advertisement
            info!("Stopped BLE advertising");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleloop_core::{AdvertiseMode, TxPowerLevel, SERVICE_UUID};
    use std::time::Duration;

    #[test]
    fn test_demo_advertisement() {
        let adv = build_advertisement(
            &AdvertiseSettings::default(),
            &AdvertiseData::service_announcement(SERVICE_UUID),
            &AdvertiseData::scan_response(),
            Some("bleloop".to_string()),
        );

        assert_eq!(adv.advertisement_type, Type::Peripheral);
        assert!(adv.service_uuids.contains(&SERVICE_UUID));
        assert_eq!(adv.local_name.as_deref(), Some("bleloop"));
        assert!(adv.system_includes.contains(&Feature::TxPower));
        assert_eq!(adv.min_interval, Some(Duration::from_millis(100)));
        assert_eq!(adv.tx_power, Some(1));
        assert_eq!(adv.timeout, None);
    }

    #[test]
    fn test_non_connectable_without_name() {
        let settings = AdvertiseSettings {
            mode: AdvertiseMode::LowPower,
            tx_power: TxPowerLevel::UltraLow,
            connectable: false,
            timeout: Some(Duration::from_secs(10)),
        };
        let data = AdvertiseData {
            include_device_name: false,
            ..AdvertiseData::service_announcement(SERVICE_UUID)
        };
        let adv = build_advertisement(
            &settings,
            &data,
            &AdvertiseData::scan_response(),
            Some("ignored".into()),
        );

        assert_eq!(adv.advertisement_type, Type::Broadcast);
        assert_eq!(adv.local_name, None);
        assert_eq!(adv.max_interval, Some(Duration::from_secs(1)));
        assert_eq!(adv.tx_power, Some(-21));
        assert_eq!(adv.timeout, Some(Duration::from_secs(10)));
    }
}
