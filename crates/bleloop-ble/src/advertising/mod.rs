//! Peripheral-mode advertising per platform
//!
//! - **Linux**: BlueZ LE advertising through `bluer`
//! - **Other platforms**: no peripheral support; the adapter hands out no advertiser

#[cfg(target_os = "linux")]
pub mod linux;

use bleloop_core::{AdvertiseCallback, AdvertiseData, AdvertiseSettings, BleAdvertiser};

// ----------------------------------------------------------------------------
// Platform Dispatch
// ----------------------------------------------------------------------------

/// Platform-specific advertiser.
///
/// Uninhabited on platforms without an advertising backend.
pub enum PlatformAdvertiser {
    #[cfg(target_os = "linux")]
    Linux(linux::LinuxAdvertiser),
}

#[async_trait::async_trait]
impl BleAdvertiser for PlatformAdvertiser {
    #[cfg_attr(not(target_os = "linux"), allow(unused_variables))]
    async fn start_advertising(
        &self,
        settings: AdvertiseSettings,
        data: AdvertiseData,
        scan_response: AdvertiseData,
        callback: AdvertiseCallback,
    ) {
        match *self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref advertiser) => {
                advertiser
                    .start_advertising(settings, data, scan_response, callback)
                    .await
            }
        }
    }

    async fn stop_advertising(&self) {
        match *self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref advertiser) => advertiser.stop_advertising().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "linux"))]
    #[allow(dead_code)]
    fn no_advertiser_exists(advertiser: PlatformAdvertiser) -> ! {
        match advertiser {}
    }

    #[test]
    fn test_dispatch_covers_every_backend() {
        #[cfg(target_os = "linux")]
        assert!(std::mem::size_of::<PlatformAdvertiser>() > 0);
        #[cfg(not(target_os = "linux"))]
        assert_eq!(std::mem::size_of::<PlatformAdvertiser>(), 0);
    }
}
