//! Backend configuration

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the hardware backends
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Pick the adapter whose name or info contains this string (first adapter if unset)
    pub adapter: Option<String>,
    /// Report repeated advertisements from an already seen device
    pub report_updates: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            report_updates: true,
        }
    }
}

impl BackendConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Select an adapter by name
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Enable or disable repeated discovery reports
    pub fn with_report_updates(mut self, enabled: bool) -> Self {
        self.report_updates = enabled;
        self
    }

    /// Whether an adapter description matches the configured selector
    pub fn selects(&self, description: &str) -> bool {
        match &self.adapter {
            Some(wanted) => description.contains(wanted.as_str()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector() {
        assert!(BackendConfig::default().selects("hci0 (usb:v1D6Bp0246d0540)"));

        let config = BackendConfig::new().with_adapter("hci1");
        assert!(config.selects("hci1 (usb)"));
        assert!(!config.selects("hci0 (usb)"));
    }
}
