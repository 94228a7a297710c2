//! Platform seam: adapter, scanner and advertiser traits plus the callback
//! handles through which a radio reports outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::error::{AdvertiseFailure, BleError, ScanFailure};
use crate::event::BleEvent;
use crate::protocol::{AdvertiseData, AdvertiseSettings, ScanFilter, ScanResult, ScanSettings};

// ----------------------------------------------------------------------------
// Platform Traits
// ----------------------------------------------------------------------------

/// A Bluetooth adapter able to hand out central and peripheral roles
#[async_trait::async_trait]
pub trait BleAdapter: Send + Sync + 'static {
    type Scanner: BleScanner;
    type Advertiser: BleAdvertiser;

    /// Short label of the backend, shown by the UI
    fn platform(&self) -> &str;

    /// Whether the adapter is powered on
    async fn is_enabled(&self) -> bool;

    /// Central-mode scanner, if the adapter exposes one
    async fn scanner(&self) -> Option<Self::Scanner>;

    /// Peripheral-mode advertiser; `None` when the hardware lacks peripheral support
    async fn advertiser(&self) -> Option<Self::Advertiser>;
}

/// Central role: listens for advertisements
#[async_trait::async_trait]
pub trait BleScanner: Send + Sync + 'static {
    /// Begin an asynchronous scan. Results and failures go to `callback`.
    async fn start_scan(
        &self,
        filters: Vec<ScanFilter>,
        settings: ScanSettings,
        callback: ScanCallback,
    );

    /// Cancel the running scan, if any
    async fn stop_scan(&self);
}

/// Peripheral role: broadcasts an advertisement
#[async_trait::async_trait]
pub trait BleAdvertiser: Send + Sync + 'static {
    /// Begin advertising. Success or failure is reported to `callback`.
    async fn start_advertising(
        &self,
        settings: AdvertiseSettings,
        data: AdvertiseData,
        scan_response: AdvertiseData,
        callback: AdvertiseCallback,
    );

    /// Stop advertising; accepted even when nothing is on air
    async fn stop_advertising(&self);
}

// ----------------------------------------------------------------------------
// Callback Handles
// ----------------------------------------------------------------------------

/// Receives scan outcomes from a platform scanner and forwards them as events
#[derive(Debug, Clone)]
pub struct ScanCallback {
    bus: EventBus,
    active: Arc<AtomicBool>,
}

impl ScanCallback {
    /// Callback bound to `bus` with its own activity flag
    pub fn new(bus: EventBus) -> Self {
        Self::with_flag(bus, Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn with_flag(bus: EventBus, active: Arc<AtomicBool>) -> Self {
        Self { bus, active }
    }

    /// Whether the scan this callback belongs to is still running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// An advertisement was received. Results arriving after the scan was
    /// stopped are dropped.
    pub fn on_scan_result(&self, result: ScanResult) {
        if !self.is_active() {
            debug!("Dropping scan result from {} after scan stopped", result.address);
            return;
        }
        self.bus.emit(BleEvent::DeviceDiscovered(result));
    }

    /// The scan could not be started or was aborted by the platform
    pub fn on_scan_failed(&self, failure: ScanFailure) {
        warn!("BLE scan failed: {}", failure);
        // A duplicate start leaves the original scan running.
        if failure != ScanFailure::AlreadyStarted {
            self.active.store(false, Ordering::SeqCst);
        }
        self.bus.emit(BleEvent::failed(BleError::ScanFailed(failure)));
    }
}

/// Receives advertising outcomes from a platform advertiser
#[derive(Debug, Clone)]
pub struct AdvertiseCallback {
    bus: EventBus,
    active: Arc<AtomicBool>,
}

impl AdvertiseCallback {
    pub fn new(bus: EventBus) -> Self {
        Self::with_flag(bus, Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn with_flag(bus: EventBus, active: Arc<AtomicBool>) -> Self {
        Self { bus, active }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The advertisement is on air with `settings` in effect
    pub fn on_start_success(&self, settings: AdvertiseSettings) {
        debug!("Advertising started with {:?}", settings);
        self.active.store(true, Ordering::SeqCst);
        self.bus.emit(BleEvent::AdvertisingStarted);
    }

    pub fn on_start_failure(&self, failure: AdvertiseFailure) {
        warn!("BLE advertising failed: {}", failure);
        if failure != AdvertiseFailure::AlreadyStarted {
            self.active.store(false, Ordering::SeqCst);
        }
        self.bus
            .emit(BleEvent::failed(BleError::AdvertiseStartFailed(failure)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_scan_failure_clears_active_flag() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let callback = ScanCallback::new(bus);

        callback.on_scan_failed(ScanFailure::OutOfHardwareResources);

        assert!(!callback.is_active());
        let event = sub.try_recv().unwrap();
        assert_eq!(
            event.error(),
            Some(&BleError::ScanFailed(ScanFailure::OutOfHardwareResources))
        );
    }

    #[test]
    fn test_duplicate_start_keeps_scan_active() {
        let callback = ScanCallback::new(EventBus::new());
        callback.on_scan_failed(ScanFailure::AlreadyStarted);
        assert!(callback.is_active());
    }

    #[test]
    fn test_results_after_stop_are_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let flag = Arc::new(AtomicBool::new(true));
        let callback = ScanCallback::with_flag(bus, flag.clone());

        callback.on_scan_result(ScanResult::new("AA", None, -30));
        flag.store(false, Ordering::SeqCst);
        callback.on_scan_result(ScanResult::new("AA", None, -31));

        assert_eq!(sub.try_recv().map(|e| e.kind()), Some(EventKind::DeviceDiscovered));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_advertise_callbacks_track_state() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let callback = AdvertiseCallback::new(bus);
        assert!(!callback.is_active());

        callback.on_start_success(AdvertiseSettings::default());
        assert!(callback.is_active());
        assert_eq!(sub.try_recv(), Some(BleEvent::AdvertisingStarted));

        callback.on_start_failure(AdvertiseFailure::TooManyAdvertisers);
        assert!(!callback.is_active());
        assert_eq!(sub.try_recv().map(|e| e.kind()), Some(EventKind::Failed));
    }
}
