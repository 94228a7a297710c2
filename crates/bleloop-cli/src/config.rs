//! bleloop CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `bleloop.toml` in the working directory
//! - `<config dir>/bleloop/config.toml`
//! - A file passed with `--config`
//! - Environment variables (`BLELOOP_SECTION__KEY`)
//! - Command line flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use bleloop_ble::BackendConfig;
use bleloop_core::ControllerConfig;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the bleloop CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Radio parameters for the session controller
    pub session: ControllerConfig,
    /// Hardware backend selection
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
    pub ui: UiConfig,
    /// In-memory radio used by `--simulated`
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Log file used while the shell owns the terminal
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Redraw interval of the shell in milliseconds
    pub tick_rate_ms: u64,
    /// Most recent log lines kept on screen
    pub max_log_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Use the in-memory radio instead of hardware
    pub enabled: bool,
    /// Name of the local simulated adapter
    pub device_name: String,
    /// Simulated neighbours advertising the demo service
    pub peers: Vec<String>,
    /// How often advertisements on air reach scanners, in milliseconds
    pub sweep_interval_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 50,
            max_log_lines: 500,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device_name: "bleloop".to_string(),
            peers: vec!["pixel-7".to_string(), "heart-strap".to_string()],
            sweep_interval_ms: 1000,
        }
    }
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }
}

impl SimulationConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl LoggingConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Unknown log level: {}", self.level)))
    }

    /// Where shell-mode logs go: the configured file, else the data directory
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("bleloop").join("bleloop.log")))
    }
}

// ----------------------------------------------------------------------------
// Command Line Overrides
// ----------------------------------------------------------------------------

/// Flags that take precedence over every configuration source
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
    pub simulated: bool,
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from every source in priority order
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("bleloop.toml"));

        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        Self::extract(Self::apply(figment, overrides))
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()));

        Self::extract(figment)
    }

    fn apply(mut figment: Figment, overrides: &Overrides) -> Figment {
        if let Some(path) = &overrides.config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("BLELOOP_").split("__"));

        if overrides.verbose {
            figment = figment.merge(("logging.level", "debug"));
        }
        if overrides.simulated {
            figment = figment.merge(("simulation.enabled", true));
        }
        figment
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/bleloop/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bleloop").join("config.toml"))
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::FileSystem(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), toml_string)
            .map_err(|e| ConfigError::FileSystem(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.tracing_level()?;

        if self.ui.tick_rate_ms == 0 {
            return Err(ConfigError::Validation(
                "UI tick rate must be greater than 0".to_string(),
            ));
        }
        if self.ui.max_log_lines == 0 {
            return Err(ConfigError::Validation(
                "UI must keep at least one log line".to_string(),
            ));
        }
        if self.simulation.sweep_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Simulation sweep interval must be greater than 0".to_string(),
            ));
        }
        if self.session.advertise_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "Advertise timeout must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
