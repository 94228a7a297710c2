//! Core of the bleloop BLE demo
//!
//! This crate holds everything that does not touch a real radio:
//!
//! - [`protocol`] - service UUID, scan/advertise settings, advertising payload encoding
//! - [`error`] - the closed set of failures a session can report
//! - [`event`] - structured events carried on the `bleLog` channel
//! - [`bus`] - the event channel itself
//! - [`platform`] - traits a radio backend implements, and the callback handles it reports through
//! - [`controller`] - the session controller exposing the four commands
//! - [`bridge`] - the UI-side log and toggle shell
//! - [`mock`] - an in-memory radio for tests and simulation
//!
//! ## Usage
//!
//! ```rust
//! use bleloop_core::mock::{MockAdapter, MockRadio};
//! use bleloop_core::{BleSessionController, ControllerConfig, LogBridge};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let radio = MockRadio::new();
//! let controller = BleSessionController::new(
//!     Some(MockAdapter::new(&radio, "demo")),
//!     ControllerConfig::default(),
//! );
//! let mut bridge = LogBridge::attach(controller.events());
//!
//! controller.start_advertising().await;
//! bridge.pump();
//!
//! for line in bridge.log().lines() {
//!     println!("{}", line);
//! }
//! # }
//! ```

pub mod bridge;
pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod mock;
pub mod platform;
pub mod protocol;

// Public API exports
pub use bridge::{EventLog, LogBridge, LogEntry, Shell};
pub use bus::{EventBus, Subscription};
pub use config::ControllerConfig;
pub use controller::{BleSessionController, SessionCommand, SessionState};
pub use error::{AdvertiseFailure, BleError, ScanFailure};
pub use event::{BleEvent, EventKind};
pub use platform::{AdvertiseCallback, BleAdapter, BleAdvertiser, BleScanner, ScanCallback};
pub use protocol::{
    AdvertiseData, AdvertiseMode, AdvertiseSettings, ScanFilter, ScanMode, ScanResult,
    ScanSettings, TxPowerLevel, LOG_EVENT_NAME, SERVICE_UUID, UNKNOWN_DEVICE_NAME,
};
