//! BLE session controller
//!
//! Wraps one adapter and exposes four commands. Commands never return an
//! outcome; everything they cause, success or failure, arrives on the
//! [`EventBus`]. There is no correlation between a command and its events,
//! so a controller is meant to be driven by a single caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::config::ControllerConfig;
use crate::error::{BleError, ScanFailure};
use crate::event::BleEvent;
use crate::platform::{AdvertiseCallback, BleAdapter, BleAdvertiser, BleScanner, ScanCallback};
use crate::protocol::{ScanFilter, SERVICE_UUID};

// ----------------------------------------------------------------------------
// Commands and State
// ----------------------------------------------------------------------------

/// The four operations a controller accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    StartScan,
    StopScan,
    StartAdvertising,
    StopAdvertising,
}

/// Snapshot of which roles are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub scanning: bool,
    pub advertising: bool,
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

/// Owns the adapter and the scanner/advertiser handles of one BLE session
pub struct BleSessionController<A: BleAdapter> {
    adapter: Option<A>,
    config: ControllerConfig,
    bus: EventBus,
    scanner: Mutex<Option<A::Scanner>>,
    advertiser: Mutex<Option<A::Advertiser>>,
    scan_active: Arc<AtomicBool>,
    advertise_active: Arc<AtomicBool>,
}

impl<A: BleAdapter> BleSessionController<A> {
    /// Create a controller; `None` means the host has no Bluetooth adapter
    pub fn new(adapter: Option<A>, config: ControllerConfig) -> Self {
        Self::with_bus(adapter, config, EventBus::new())
    }

    /// Create a controller emitting on an existing bus
    pub fn with_bus(adapter: Option<A>, config: ControllerConfig, bus: EventBus) -> Self {
        Self {
            adapter,
            config,
            bus,
            scanner: Mutex::new(None),
            advertiser: Mutex::new(None),
            scan_active: Arc::new(AtomicBool::new(false)),
            advertise_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle to the event channel
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to the event channel
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Backend label, or `"none"` without an adapter
    pub fn platform(&self) -> &str {
        self.adapter.as_ref().map(|a| a.platform()).unwrap_or("none")
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            scanning: self.scan_active.load(Ordering::SeqCst),
            advertising: self.advertise_active.load(Ordering::SeqCst),
        }
    }

    /// Run one command
    pub async fn execute(&self, command: SessionCommand) {
        debug!("Executing {:?}", command);
        match command {
            SessionCommand::StartScan => self.start_scan().await,
            SessionCommand::StopScan => self.stop_scan().await,
            SessionCommand::StartAdvertising => self.start_advertising().await,
            SessionCommand::StopAdvertising => self.stop_advertising().await,
        }
    }

    /// Start scanning for advertisements carrying [`SERVICE_UUID`]
    pub async fn start_scan(&self) {
        let Some(adapter) = self.enabled_adapter().await else {
            return;
        };

        let mut slot = self.scanner.lock().await;
        if slot.is_none() {
            *slot = adapter.scanner().await;
        }
        let Some(scanner) = slot.as_ref() else {
            warn!("Adapter is on but exposes no scanner");
            self.bus
                .emit(BleEvent::failed(BleError::ScanFailed(ScanFailure::FeatureUnsupported)));
            return;
        };

        info!("Starting BLE scan for service {}", SERVICE_UUID);
        self.bus.emit(BleEvent::ScanStarted);
        self.scan_active.store(true, Ordering::SeqCst);

        let callback = ScanCallback::with_flag(self.bus.clone(), self.scan_active.clone());
        scanner
            .start_scan(
                vec![ScanFilter::service(SERVICE_UUID)],
                self.config.scan_settings(),
                callback,
            )
            .await;
    }

    /// Stop the running scan. Silent when no scan is active or the adapter is off.
    pub async fn stop_scan(&self) {
        let slot = self.scanner.lock().await;
        if !self.scan_active.load(Ordering::SeqCst) {
            return;
        }
        let Some(adapter) = self.adapter.as_ref() else {
            return;
        };
        if !adapter.is_enabled().await {
            debug!("Ignoring stop scan while adapter is off");
            return;
        }
        let Some(scanner) = slot.as_ref() else {
            return;
        };

        scanner.stop_scan().await;
        self.scan_active.store(false, Ordering::SeqCst);
        info!("Stopped BLE scan");
        self.bus.emit(BleEvent::ScanStopped);
    }

    /// Start advertising [`SERVICE_UUID`]
    pub async fn start_advertising(&self) {
        let Some(adapter) = self.enabled_adapter().await else {
            return;
        };

        let mut slot = self.advertiser.lock().await;
        if slot.is_none() {
            *slot = adapter.advertiser().await;
        }
        let Some(advertiser) = slot.as_ref() else {
            warn!("Peripheral mode not supported by this adapter");
            self.bus.emit(BleEvent::failed(BleError::AdvertiserUnsupported));
            return;
        };

        info!("Starting BLE advertising for service {}", SERVICE_UUID);
        self.bus.emit(BleEvent::AdvertisingRequested {
            service_uuid: SERVICE_UUID,
        });

        let callback = AdvertiseCallback::with_flag(self.bus.clone(), self.advertise_active.clone());
        advertiser
            .start_advertising(
                self.config.advertise_settings(),
                self.config.advertise_data(),
                self.config.scan_response(),
                callback,
            )
            .await;
    }

    /// Stop advertising. Always confirms, even when nothing was advertised.
    pub async fn stop_advertising(&self) {
        let slot = self.advertiser.lock().await;
        if let Some(advertiser) = slot.as_ref() {
            advertiser.stop_advertising().await;
        }
        self.advertise_active.store(false, Ordering::SeqCst);
        info!("Stopped BLE advertising");
        self.bus.emit(BleEvent::AdvertisingStopped);
    }

    /// Stop whatever is still running before the session goes away
    pub async fn shutdown(&self) {
        let state = self.state();
        if state.scanning {
            self.stop_scan().await;
        }
        if state.advertising {
            self.stop_advertising().await;
        }
        debug!("BLE session shut down");
    }

    /// The adapter, if present and powered; otherwise reports why not
    async fn enabled_adapter(&self) -> Option<&A> {
        let Some(adapter) = self.adapter.as_ref() else {
            self.bus.emit(BleEvent::failed(BleError::AdapterUnavailable));
            return None;
        };
        if !adapter.is_enabled().await {
            self.bus.emit(BleEvent::failed(BleError::AdapterDisabled));
            return None;
        }
        Some(adapter)
    }
}
