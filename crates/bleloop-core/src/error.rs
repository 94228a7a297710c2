//! Error types for BLE session operations
//!
//! Every failure the radio can report maps onto [`BleError`]. Failures are
//! delivered as events rather than returned, so the taxonomy is closed and
//! cloneable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Platform Failure Codes
// ----------------------------------------------------------------------------

/// Reason a scan could not be started, with the platform's numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanFailure {
    AlreadyStarted,
    ApplicationRegistrationFailed,
    InternalError,
    FeatureUnsupported,
    OutOfHardwareResources,
    ScanningTooFrequently,
    Other(i32),
}

impl ScanFailure {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::AlreadyStarted,
            2 => Self::ApplicationRegistrationFailed,
            3 => Self::InternalError,
            4 => Self::FeatureUnsupported,
            5 => Self::OutOfHardwareResources,
            6 => Self::ScanningTooFrequently,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::AlreadyStarted => 1,
            Self::ApplicationRegistrationFailed => 2,
            Self::InternalError => 3,
            Self::FeatureUnsupported => 4,
            Self::OutOfHardwareResources => 5,
            Self::ScanningTooFrequently => 6,
            Self::Other(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::AlreadyStarted => "scan already started",
            Self::ApplicationRegistrationFailed => "application registration failed",
            Self::InternalError => "internal error",
            Self::FeatureUnsupported => "feature unsupported",
            Self::OutOfHardwareResources => "out of hardware resources",
            Self::ScanningTooFrequently => "scanning too frequently",
            Self::Other(_) => "unknown error",
        }
    }
}

impl std::fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// Reason advertising could not be started, with the platform's numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertiseFailure {
    DataTooLarge,
    TooManyAdvertisers,
    AlreadyStarted,
    InternalError,
    FeatureUnsupported,
    Other(i32),
}

impl AdvertiseFailure {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::DataTooLarge,
            2 => Self::TooManyAdvertisers,
            3 => Self::AlreadyStarted,
            4 => Self::InternalError,
            5 => Self::FeatureUnsupported,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::DataTooLarge => 1,
            Self::TooManyAdvertisers => 2,
            Self::AlreadyStarted => 3,
            Self::InternalError => 4,
            Self::FeatureUnsupported => 5,
            Self::Other(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DataTooLarge => "advertise data too large",
            Self::TooManyAdvertisers => "too many advertisers",
            Self::AlreadyStarted => "advertising already started",
            Self::InternalError => "internal error",
            Self::FeatureUnsupported => "feature unsupported",
            Self::Other(_) => "unknown error",
        }
    }
}

impl std::fmt::Display for AdvertiseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Failures reported by the session controller
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "failure", rename_all = "snake_case")]
pub enum BleError {
    #[error("Bluetooth is disabled or not available.")]
    AdapterUnavailable,

    #[error("Bluetooth is disabled or not available.")]
    AdapterDisabled,

    #[error("Scan failed with error {0}")]
    ScanFailed(ScanFailure),

    #[error("Advertiser not supported on this device.")]
    AdvertiserUnsupported,

    #[error("Advertising failed with error {0}")]
    AdvertiseStartFailed(AdvertiseFailure),
}

impl BleError {
    /// True for the failures raised before any radio call is made
    pub fn is_unavailability(&self) -> bool {
        matches!(
            self,
            Self::AdapterUnavailable | Self::AdapterDisabled | Self::AdvertiserUnsupported
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_failure_codes() {
        for code in 1..=6 {
            assert_eq!(ScanFailure::from_code(code).code(), code);
        }
        assert_eq!(ScanFailure::from_code(42), ScanFailure::Other(42));
        assert_eq!(ScanFailure::InternalError.code(), 3);
    }

    #[test]
    fn test_advertise_failure_codes() {
        assert_eq!(AdvertiseFailure::from_code(1), AdvertiseFailure::DataTooLarge);
        assert_eq!(AdvertiseFailure::from_code(3), AdvertiseFailure::AlreadyStarted);
        assert_eq!(AdvertiseFailure::from_code(-7).code(), -7);
    }

    #[test]
    fn test_error_messages_carry_code() {
        let err = BleError::ScanFailed(ScanFailure::ScanningTooFrequently);
        assert_eq!(
            err.to_string(),
            "Scan failed with error 6 (scanning too frequently)"
        );

        let err = BleError::AdvertiseStartFailed(AdvertiseFailure::TooManyAdvertisers);
        assert!(err.to_string().starts_with("Advertising failed with error 2"));
    }

    #[test]
    fn test_missing_and_disabled_adapter_share_log_line() {
        assert_eq!(
            BleError::AdapterUnavailable.to_string(),
            "Bluetooth is disabled or not available."
        );
        assert_eq!(
            BleError::AdapterDisabled.to_string(),
            BleError::AdapterUnavailable.to_string()
        );
        assert_ne!(BleError::AdapterDisabled, BleError::AdapterUnavailable);
    }

    #[test]
    fn test_unavailability_classification() {
        assert!(BleError::AdapterDisabled.is_unavailability());
        assert!(BleError::AdvertiserUnsupported.is_unavailability());
        assert!(!BleError::ScanFailed(ScanFailure::InternalError).is_unavailability());
    }
}
