//! In-memory radio for tests and the simulated CLI mode
//!
//! A [`MockRadio`] is the shared air: every [`MockAdapter`] built on it can
//! advertise and scan, and [`MockRadio::sweep`] delivers each advertisement
//! on air to each matching scanner once. Faults are injected per adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::error::{AdvertiseFailure, ScanFailure};
use crate::platform::{AdvertiseCallback, BleAdapter, BleAdvertiser, BleScanner, ScanCallback};
use crate::protocol::{
    AdvertiseData, AdvertiseSettings, ScanFilter, ScanResult, ScanSettings, TxPowerLevel,
};

/// Path loss applied between TX power and reported RSSI
const SIMULATED_PATH_LOSS_DB: i16 = 60;

// ----------------------------------------------------------------------------
// Shared Air
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct OnAir {
    address: String,
    name: Option<String>,
    service_uuids: Vec<Uuid>,
    tx_power: TxPowerLevel,
}

#[derive(Debug, Clone)]
struct ActiveScan {
    filters: Vec<ScanFilter>,
    callback: ScanCallback,
}

#[derive(Debug, Default)]
struct RadioState {
    advertisements: HashMap<u64, OnAir>,
    scans: HashMap<u64, ActiveScan>,
    scans_started: u64,
    advertisements_started: u64,
}

/// Simulated medium shared by mock adapters
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    state: Arc<Mutex<RadioState>>,
    next_id: Arc<AtomicU64>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every advertisement on air to every other active scanner
    /// whose filters accept it. Returns the number of deliveries.
    pub fn sweep(&self) -> usize {
        let deliveries: Vec<(ScanCallback, ScanResult)> = {
            let state = self.lock();
            state
                .scans
                .iter()
                .flat_map(|(scan_id, scan)| {
                    state
                        .advertisements
                        .iter()
                        .filter(move |(adv_id, _)| *adv_id != scan_id)
                        .map(|(_, adv)| adv.to_result())
                        .filter(|result| accepts(&scan.filters, result))
                        .map(|result| (scan.callback.clone(), result))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        let count = deliveries.len();
        for (callback, result) in deliveries {
            callback.on_scan_result(result);
        }
        debug!("Mock radio sweep delivered {} results", count);
        count
    }

    /// Deliver an arbitrary advertisement to every active scanner that accepts it
    pub fn inject(&self, result: ScanResult) -> usize {
        let callbacks: Vec<ScanCallback> = self
            .lock()
            .scans
            .values()
            .filter(|scan| accepts(&scan.filters, &result))
            .map(|scan| scan.callback.clone())
            .collect();

        for callback in &callbacks {
            callback.on_scan_result(result.clone());
        }
        callbacks.len()
    }

    pub fn active_scan_count(&self) -> usize {
        self.lock().scans.len()
    }

    pub fn active_advertisement_count(&self) -> usize {
        self.lock().advertisements.len()
    }

    /// Scans successfully started since creation
    pub fn scans_started(&self) -> u64 {
        self.lock().scans_started
    }

    /// Advertisements successfully started since creation
    pub fn advertisements_started(&self) -> u64 {
        self.lock().advertisements_started
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock(&self) -> MutexGuard<'_, RadioState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OnAir {
    fn to_result(&self) -> ScanResult {
        ScanResult {
            address: self.address.clone(),
            name: self.name.clone(),
            rssi: self.tx_power.dbm() as i16 - SIMULATED_PATH_LOSS_DB,
            service_uuids: self.service_uuids.clone(),
        }
    }
}

fn accepts(filters: &[ScanFilter], result: &ScanResult) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(result))
}

// ----------------------------------------------------------------------------
// Adapter
// ----------------------------------------------------------------------------

/// Handle for flipping a mock adapter's power state from a test
#[derive(Debug, Clone)]
pub struct PowerSwitch(Arc<AtomicBool>);

impl PowerSwitch {
    pub fn set(&self, powered: bool) {
        self.0.store(powered, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Faults {
    scan: Option<ScanFailure>,
    advertise: Option<AdvertiseFailure>,
}

/// Simulated adapter attached to a [`MockRadio`]
#[derive(Debug, Clone)]
pub struct MockAdapter {
    radio: MockRadio,
    id: u64,
    name: String,
    address: String,
    powered: Arc<AtomicBool>,
    peripheral_supported: bool,
    faults: Arc<Mutex<Faults>>,
}

impl MockAdapter {
    /// Powered adapter with peripheral support
    pub fn new(radio: &MockRadio, name: impl Into<String>) -> Self {
        let id = radio.allocate_id();
        Self {
            radio: radio.clone(),
            id,
            name: name.into(),
            address: format!("02:00:00:00:{:02X}:{:02X}", (id >> 8) as u8, id as u8),
            powered: Arc::new(AtomicBool::new(true)),
            peripheral_supported: true,
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Start powered off
    pub fn powered_off(self) -> Self {
        self.powered.store(false, Ordering::SeqCst);
        self
    }

    /// Drop peripheral-mode support
    pub fn without_advertiser(mut self) -> Self {
        self.peripheral_supported = false;
        self
    }

    pub fn power_switch(&self) -> PowerSwitch {
        PowerSwitch(self.powered.clone())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make the next scan start fail with `failure`
    pub fn fail_next_scan(&self, failure: ScanFailure) {
        self.lock_faults().scan = Some(failure);
    }

    /// Make the next advertising start fail with `failure`
    pub fn fail_next_advertise(&self, failure: AdvertiseFailure) {
        self.lock_faults().advertise = Some(failure);
    }

    fn lock_faults(&self) -> MutexGuard<'_, Faults> {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl BleAdapter for MockAdapter {
    type Scanner = MockScanner;
    type Advertiser = MockAdvertiser;

    fn platform(&self) -> &str {
        "simulated"
    }

    async fn is_enabled(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    async fn scanner(&self) -> Option<MockScanner> {
        Some(MockScanner {
            adapter: self.clone(),
        })
    }

    async fn advertiser(&self) -> Option<MockAdvertiser> {
        self.peripheral_supported.then(|| MockAdvertiser {
            adapter: self.clone(),
        })
    }
}

// ----------------------------------------------------------------------------
// Roles
// ----------------------------------------------------------------------------

/// Central role of a [`MockAdapter`]
#[derive(Debug, Clone)]
pub struct MockScanner {
    adapter: MockAdapter,
}

#[async_trait::async_trait]
impl BleScanner for MockScanner {
    async fn start_scan(
        &self,
        filters: Vec<ScanFilter>,
        settings: ScanSettings,
        callback: ScanCallback,
    ) {
        if let Some(failure) = self.adapter.lock_faults().scan.take() {
            callback.on_scan_failed(failure);
            return;
        }

        let mut state = self.adapter.radio.lock();
        if state.scans.contains_key(&self.adapter.id) {
            drop(state);
            callback.on_scan_failed(ScanFailure::AlreadyStarted);
            return;
        }

        debug!("{} scanning ({:?})", self.adapter.name, settings.mode);
        state
            .scans
            .insert(self.adapter.id, ActiveScan { filters, callback });
        state.scans_started += 1;
    }

    async fn stop_scan(&self) {
        self.adapter.radio.lock().scans.remove(&self.adapter.id);
    }
}

/// Peripheral role of a [`MockAdapter`]
#[derive(Debug, Clone)]
pub struct MockAdvertiser {
    adapter: MockAdapter,
}

#[async_trait::async_trait]
impl BleAdvertiser for MockAdvertiser {
    async fn start_advertising(
        &self,
        settings: AdvertiseSettings,
        data: AdvertiseData,
        scan_response: AdvertiseData,
        callback: AdvertiseCallback,
    ) {
        if let Some(failure) = self.adapter.lock_faults().advertise.take() {
            callback.on_start_failure(failure);
            return;
        }

        let encoded = data
            .encode(&self.adapter.name, settings.tx_power, settings.connectable)
            .and_then(|_| scan_response.encode(&self.adapter.name, settings.tx_power, false));
        if let Err(failure) = encoded {
            callback.on_start_failure(failure);
            return;
        }

        {
            let mut state = self.adapter.radio.lock();
            if state.advertisements.contains_key(&self.adapter.id) {
                drop(state);
                callback.on_start_failure(AdvertiseFailure::AlreadyStarted);
                return;
            }

            let on_air = OnAir {
                address: self.adapter.address.clone(),
                name: data
                    .include_device_name
                    .then(|| self.adapter.name.clone()),
                service_uuids: data.service_uuids.clone(),
                tx_power: settings.tx_power,
            };
            state.advertisements.insert(self.adapter.id, on_air);
            state.advertisements_started += 1;
        }

        callback.on_start_success(settings);
    }

    async fn stop_advertising(&self) {
        self.adapter
            .radio
            .lock()
            .advertisements
            .remove(&self.adapter.id);
    }
}
