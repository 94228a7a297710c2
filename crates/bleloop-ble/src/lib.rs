//! Radio backends for bleloop
//!
//! This crate implements the `bleloop-core` platform traits on real hardware:
//!
//! - [`adapter`] - adapter selection and power state
//! - [`discovery`] - central-mode scanning through btleplug
//! - [`advertising`] - peripheral-mode advertising
//! - [`config`] - backend configuration
//! - [`error`] - backend errors and failure-code mapping
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bleloop_ble::{BackendConfig, PlatformAdapter};
//! use bleloop_core::{BleSessionController, ControllerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = PlatformAdapter::open(BackendConfig::default()).await?;
//! let controller = BleSessionController::new(adapter, ControllerConfig::default());
//!
//! controller.start_scan().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux**: scanning via btleplug, advertising via `bluer` and BlueZ
//! - **Other platforms**: scanning only; the adapter reports no advertiser

pub mod adapter;
pub mod advertising;
pub mod config;
pub mod discovery;
pub mod error;

// Public API exports
pub use adapter::PlatformAdapter;
pub use advertising::PlatformAdvertiser;
pub use config::BackendConfig;
pub use discovery::BtleplugScanner;
pub use error::BackendError;
