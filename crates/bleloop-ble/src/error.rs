//! Backend errors and their mapping onto session failure codes

use bleloop_core::ScanFailure;
#[cfg(target_os = "linux")]
use bleloop_core::AdvertiseFailure;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while opening a hardware backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to create BLE manager: {0}")]
    ManagerUnavailable(String),

    #[error("Failed to list BLE adapters: {0}")]
    AdapterQuery(String),
}

// ----------------------------------------------------------------------------
// Failure Mapping
// ----------------------------------------------------------------------------

/// Classify a btleplug error raised while starting a scan
pub fn scan_failure(err: &btleplug::Error) -> ScanFailure {
    match err {
        btleplug::Error::NotSupported(_) => ScanFailure::FeatureUnsupported,
        btleplug::Error::PermissionDenied => ScanFailure::ApplicationRegistrationFailed,
        _ => ScanFailure::InternalError,
    }
}

/// Classify a BlueZ error raised while registering an advertisement
#[cfg(target_os = "linux")]
pub fn advertise_failure(err: &bluer::Error) -> AdvertiseFailure {
    match err.kind {
        bluer::ErrorKind::AlreadyExists => AdvertiseFailure::AlreadyStarted,
        bluer::ErrorKind::InvalidLength => AdvertiseFailure::DataTooLarge,
        bluer::ErrorKind::NotSupported => AdvertiseFailure::FeatureUnsupported,
        _ => AdvertiseFailure::InternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_failure_mapping() {
        assert_eq!(
            scan_failure(&btleplug::Error::NotSupported("scan".into())),
            ScanFailure::FeatureUnsupported
        );
        assert_eq!(
            scan_failure(&btleplug::Error::PermissionDenied),
            ScanFailure::ApplicationRegistrationFailed
        );
        assert_eq!(
            scan_failure(&btleplug::Error::RuntimeError("dbus".into())),
            ScanFailure::InternalError
        );
    }

    #[test]
    fn test_backend_error_messages() {
        let err = BackendError::AdapterQuery("no dbus".to_string());
        assert_eq!(err.to_string(), "Failed to list BLE adapters: no dbus");
    }
}
