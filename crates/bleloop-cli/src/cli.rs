//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use the in-memory radio instead of Bluetooth hardware
    #[arg(long)]
    pub simulated: bool,

    /// Print events as JSON lines instead of log text
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactive shell with scan and advertise toggles
    Tui,
    /// Scan for the demo service, print discoveries, then stop
    Scan {
        /// Seconds to scan for
        #[arg(short, long, default_value_t = 10)]
        duration: u64,
    },
    /// Advertise the demo service for a while, then stop
    Advertise {
        /// Seconds to advertise for
        #[arg(short, long, default_value_t = 10)]
        duration: u64,
    },
    /// Two simulated sessions discovering each other
    Demo,
}

impl Cli {
    /// The subcommand to run; the shell when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Tui)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_tui() {
        let cli = Cli::parse_from(["bleloop"]);
        assert_eq!(cli.command(), Commands::Tui);
        assert!(!cli.simulated);
    }

    #[test]
    fn test_scan_with_flags() {
        let cli = Cli::parse_from(["bleloop", "--simulated", "--json", "scan", "-d", "3"]);
        assert_eq!(cli.command(), Commands::Scan { duration: 3 });
        assert!(cli.simulated);
        assert!(cli.json);
    }

    #[test]
    fn test_advertise_default_duration() {
        let cli = Cli::parse_from(["bleloop", "advertise"]);
        assert_eq!(cli.command(), Commands::Advertise { duration: 10 });
    }
}
