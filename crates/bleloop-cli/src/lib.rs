//! bleloop CLI library
//!
//! The terminal shell, the headless scan/advertise runners and the
//! simulated demo, plus the configuration they share.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
#[cfg(feature = "tui")]
pub mod tui;

pub use app::{OutputFormat, Simulation};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
