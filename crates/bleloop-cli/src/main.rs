//! bleloop - BLE scan/advertise demo

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use bleloop_ble::PlatformAdapter;
use bleloop_core::{BleAdapter, BleSessionController, SessionCommand};
use bleloop_cli::{
    app::{self, OutputFormat, Simulation},
    cli::{Cli, Commands},
    config::{AppConfig, LoggingConfig, Overrides},
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();
    let command = cli.command();

    // Load configuration; flags win over files and environment
    let config = AppConfig::load(&Overrides {
        config_file: cli.config.as_ref().map(PathBuf::from),
        verbose: cli.verbose,
        simulated: cli.simulated,
    })?;

    // The shell owns the terminal, so its logs go to a file
    setup_logging(&config.logging, command == Commands::Tui)?;

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    if let Err(e) = run(command, &config, format).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("bleloop exited successfully");
    Ok(())
}

async fn run(command: Commands, config: &AppConfig, format: OutputFormat) -> Result<()> {
    if command == Commands::Demo {
        let report = app::run_demo(config, format, &mut std::io::stdout()).await?;
        if !report.succeeded() {
            std::process::exit(2);
        }
        return Ok(());
    }

    if config.simulation.enabled {
        info!("Using simulated radio");
        let (simulation, adapter) = Simulation::start(config).await;
        let controller = Arc::new(BleSessionController::new(
            Some(adapter),
            config.session.clone(),
        ));
        let result = run_session(controller, command, config, format).await;
        simulation.stop().await;
        return result;
    }

    let adapter = PlatformAdapter::open(config.backend.clone()).await?;
    if adapter.is_none() {
        warn!("Continuing without a Bluetooth adapter");
    }
    let controller = Arc::new(BleSessionController::new(adapter, config.session.clone()));
    run_session(controller, command, config, format).await
}

async fn run_session<A: BleAdapter>(
    controller: Arc<BleSessionController<A>>,
    command: Commands,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<()> {
    info!("Session running on {}", controller.platform());
    let mut stdout = std::io::stdout();

    match command {
        Commands::Tui => run_tui(controller, config).await,
        Commands::Scan { duration } => app::run_for(
            controller,
            SessionCommand::StartScan,
            SessionCommand::StopScan,
            Duration::from_secs(duration),
            format,
            &mut stdout,
        )
        .await
        .map(|_| ()),
        Commands::Advertise { duration } => app::run_for(
            controller,
            SessionCommand::StartAdvertising,
            SessionCommand::StopAdvertising,
            Duration::from_secs(duration),
            format,
            &mut stdout,
        )
        .await
        .map(|_| ()),
        Commands::Demo => app::run_demo(config, format, &mut stdout).await.map(|_| ()),
    }
}

#[cfg(feature = "tui")]
async fn run_tui<A: BleAdapter>(
    controller: Arc<BleSessionController<A>>,
    config: &AppConfig,
) -> Result<()> {
    let mut manager = bleloop_cli::tui::TuiManager::new(controller, &config.ui)?;
    manager.run().await
}

#[cfg(not(feature = "tui"))]
async fn run_tui<A: BleAdapter>(
    controller: Arc<BleSessionController<A>>,
    _config: &AppConfig,
) -> Result<()> {
    controller.shutdown().await;
    Err(bleloop_cli::CliError::FeatureNotAvailable(
        "interactive shell (built without the tui feature)".to_string(),
    ))
}

/// Setup logging based on the configured level
fn setup_logging(config: &LoggingConfig, to_file: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if !to_file {
        // Keep stdout for event output
        builder.with_writer(std::io::stderr).init();
        return Ok(());
    }

    match config.file_path() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::sink).init(),
    }
    Ok(())
}
