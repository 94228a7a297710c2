//! Hardware adapter selection
//!
//! Scanning goes through btleplug on every platform. On Linux a BlueZ session
//! is opened alongside it for power state and advertising.

use bleloop_core::BleAdapter;
use btleplug::api::{Central, CentralState, Manager as _};
use btleplug::platform::{Adapter, Manager};
use tracing::{debug, info, warn};

use crate::advertising::PlatformAdvertiser;
use crate::config::BackendConfig;
use crate::discovery::BtleplugScanner;
use crate::error::BackendError;

// ----------------------------------------------------------------------------
// Platform Adapter
// ----------------------------------------------------------------------------

/// The host's Bluetooth adapter
pub struct PlatformAdapter {
    central: Adapter,
    info: String,
    config: BackendConfig,
    #[cfg(target_os = "linux")]
    bluez: Option<BluezAdapter>,
}

/// BlueZ handle; the session must outlive the adapter proxy
#[cfg(target_os = "linux")]
struct BluezAdapter {
    _session: bluer::Session,
    adapter: bluer::Adapter,
}

impl PlatformAdapter {
    /// Open the first adapter matching `config`.
    ///
    /// `Ok(None)` means the host has no usable adapter; errors mean the
    /// Bluetooth stack itself could not be queried.
    pub async fn open(config: BackendConfig) -> Result<Option<Self>, BackendError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BackendError::ManagerUnavailable(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BackendError::AdapterQuery(e.to_string()))?;

        let mut selected = None;
        for adapter in adapters {
            let info = match adapter.adapter_info().await {
                Ok(info) => info,
                Err(e) => {
                    debug!("Skipping adapter without info: {}", e);
                    continue;
                }
            };
            if config.selects(&info) {
                selected = Some((adapter, info));
                break;
            }
        }

        let Some((central, info)) = selected else {
            warn!("No BLE adapter available");
            return Ok(None);
        };
        info!("BLE adapter selected: {}", info);

        Ok(Some(Self {
            #[cfg(target_os = "linux")]
            bluez: open_bluez(&config).await,
            central,
            info,
            config,
        }))
    }

    /// Description reported by the platform for the selected adapter
    pub fn info(&self) -> &str {
        &self.info
    }
}

#[cfg(target_os = "linux")]
async fn open_bluez(config: &BackendConfig) -> Option<BluezAdapter> {
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            warn!("Failed to create BlueZ session: {}", e);
            return None;
        }
    };

    let names = session.adapter_names().await.unwrap_or_default();
    let adapter = match names.iter().find(|name| config.selects(name)) {
        Some(name) => session.adapter(name),
        None => session.default_adapter().await,
    };

    match adapter {
        Ok(adapter) => Some(BluezAdapter {
            _session: session,
            adapter,
        }),
        Err(e) => {
            warn!("Failed to open BlueZ adapter: {}", e);
            None
        }
    }
}

/// Anything but a confirmed `PoweredOn` counts as off
fn is_powered_on(state: btleplug::Result<CentralState>) -> bool {
    match state {
        Ok(CentralState::PoweredOn) => true,
        Ok(state) => {
            debug!("Adapter state is {:?}", state);
            false
        }
        Err(e) => {
            warn!("Failed to read adapter state: {}", e);
            false
        }
    }
}

#[async_trait::async_trait]
impl BleAdapter for PlatformAdapter {
    type Scanner = BtleplugScanner;
    type Advertiser = PlatformAdvertiser;

    fn platform(&self) -> &str {
        std::env::consts::OS
    }

    async fn is_enabled(&self) -> bool {
        #[cfg(target_os = "linux")]
        if let Some(bluez) = &self.bluez {
            match bluez.adapter.is_powered().await {
                Ok(powered) => return powered,
                Err(e) => warn!("Failed to read BlueZ power state: {}", e),
            }
        }
        is_powered_on(self.central.adapter_state().await)
    }

    async fn scanner(&self) -> Option<Self::Scanner> {
        Some(BtleplugScanner::new(
            self.central.clone(),
            self.config.clone(),
        ))
    }

    async fn advertiser(&self) -> Option<Self::Advertiser> {
        #[cfg(target_os = "linux")]
        {
            use crate::advertising::linux::LinuxAdvertiser;

            let bluez = self.bluez.as_ref()?;
            if !LinuxAdvertiser::is_supported(&bluez.adapter).await {
                warn!("Adapter {} has no LE advertising support", bluez.adapter.name());
                return None;
            }
            Some(PlatformAdvertiser::Linux(LinuxAdvertiser::new(
                bluez.adapter.clone(),
            )))
        }

        #[cfg(not(target_os = "linux"))]
        {
            warn!("BLE advertising is not available on {}", std::env::consts::OS);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_powered_on_counts_as_enabled() {
        assert!(is_powered_on(Ok(CentralState::PoweredOn)));
        assert!(!is_powered_on(Ok(CentralState::PoweredOff)));
        assert!(!is_powered_on(Err(btleplug::Error::NotSupported(
            "adapter state".into()
        ))));
    }
}
