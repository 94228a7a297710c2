//! Central-mode scanning with btleplug
//!
//! btleplug exposes discovery as a stream of adapter events. A background task
//! turns every discovery or update carrying an RSSI into one scan result.

use std::pin::Pin;

use bleloop_core::{BleScanner, ScanCallback, ScanFailure, ScanFilter, ScanResult, ScanSettings};
use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter as CentralScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::scan_failure;

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

/// Scanner over a btleplug adapter
pub struct BtleplugScanner {
    adapter: Adapter,
    config: BackendConfig,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugScanner {
    pub fn new(adapter: Adapter, config: BackendConfig) -> Self {
        Self {
            adapter,
            config,
            event_task: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl BleScanner for BtleplugScanner {
    async fn start_scan(
        &self,
        filters: Vec<ScanFilter>,
        settings: ScanSettings,
        callback: ScanCallback,
    ) {
        let mut event_task = self.event_task.lock().await;
        if event_task.is_some() {
            callback.on_scan_failed(ScanFailure::AlreadyStarted);
            return;
        }

        let events = match self.adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to get BLE events: {}", e);
                callback.on_scan_failed(scan_failure(&e));
                return;
            }
        };

        let central_filter = CentralScanFilter {
            services: filters.iter().filter_map(|f| f.service_uuid).collect(),
        };
        if let Err(e) = self.adapter.start_scan(central_filter).await {
            warn!("Failed to start BLE scan: {}", e);
            callback.on_scan_failed(scan_failure(&e));
            return;
        }

        // btleplug has no duty-cycle control; the platform default applies.
        debug!("Requested scan mode {:?}", settings.mode);
        info!("Started BLE scanning");

        *event_task = Some(tokio::spawn(forward_discoveries(
            self.adapter.clone(),
            events,
            filters,
            callback,
            self.config.report_updates,
        )));
    }

    async fn stop_scan(&self) {
        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// Event Processing
// ----------------------------------------------------------------------------

async fn forward_discoveries(
    adapter: Adapter,
    mut events: CentralEvents,
    filters: Vec<ScanFilter>,
    callback: ScanCallback,
    report_updates: bool,
) {
    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) => id,
            CentralEvent::DeviceUpdated(id) if report_updates => id,
            _ => continue,
        };

        let Some(result) = scan_result(&adapter, &id).await else {
            continue;
        };
        if filters.is_empty() || filters.iter().any(|f| f.matches(&result)) {
            callback.on_scan_result(result);
        }
    }
    debug!("BLE event stream ended");
}

/// Snapshot a peripheral as a scan result; `None` until it has an RSSI
async fn scan_result(adapter: &Adapter, id: &PeripheralId) -> Option<ScanResult> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;
    let Some(rssi) = properties.rssi else {
        debug!("Skipping {} without RSSI", properties.address);
        return None;
    };

    Some(ScanResult {
        address: properties.address.to_string(),
        name: properties.local_name,
        rssi,
        service_uuids: properties.services,
    })
}
