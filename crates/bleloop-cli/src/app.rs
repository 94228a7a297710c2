//! Session setup and the headless commands
//!
//! Every command runs against a [`BleSessionController`] generic over the
//! adapter, so hardware and the in-memory radio share one code path.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bleloop_core::mock::{MockAdapter, MockRadio};
use bleloop_core::{
    BleAdapter, BleSessionController, EventKind, EventLog, LogBridge, LogEntry, SessionCommand,
};

use crate::config::{AppConfig, SimulationConfig};
use crate::error::Result;

// ----------------------------------------------------------------------------
// Output
// ----------------------------------------------------------------------------

/// How headless commands print events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The same lines the shell shows
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Serialize)]
struct TaggedEntry<'a> {
    session: &'a str,
    #[serde(flatten)]
    entry: &'a LogEntry,
}

/// Print one log entry, optionally tagged with the session it came from
pub fn write_entry(
    out: &mut impl Write,
    format: OutputFormat,
    session: Option<&str>,
    entry: &LogEntry,
) -> Result<()> {
    match (format, session) {
        (OutputFormat::Text, None) => writeln!(out, "{}", entry.event)?,
        (OutputFormat::Text, Some(session)) => writeln!(out, "[{}] {}", session, entry.event)?,
        (OutputFormat::Json, None) => writeln!(out, "{}", serde_json::to_string(entry)?)?,
        (OutputFormat::Json, Some(session)) => writeln!(
            out,
            "{}",
            serde_json::to_string(&TaggedEntry { session, entry })?
        )?,
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Simulation
// ----------------------------------------------------------------------------

/// In-memory radio with advertising neighbours and a periodic sweep
pub struct Simulation {
    radio: MockRadio,
    neighbours: Vec<BleSessionController<MockAdapter>>,
    sweeper: JoinHandle<()>,
}

impl Simulation {
    /// Bring up the neighbours and start sweeping; returns the local adapter
    pub async fn start(config: &AppConfig) -> (Self, MockAdapter) {
        let radio = MockRadio::new();
        let local = MockAdapter::new(&radio, config.simulation.device_name.clone());

        let mut neighbours = Vec::with_capacity(config.simulation.peers.len());
        for name in &config.simulation.peers {
            let controller = BleSessionController::new(
                Some(MockAdapter::new(&radio, name.clone())),
                config.session.clone(),
            );
            controller.start_advertising().await;
            debug!("Simulated neighbour {} is advertising", name);
            neighbours.push(controller);
        }

        let sweeper = spawn_sweeper(radio.clone(), &config.simulation);
        info!(
            "Simulated radio up with {} neighbours",
            config.simulation.peers.len()
        );

        (
            Self {
                radio,
                neighbours,
                sweeper,
            },
            local,
        )
    }

    pub fn radio(&self) -> &MockRadio {
        &self.radio
    }

    /// Take the neighbours off air and stop sweeping
    pub async fn stop(self) {
        self.sweeper.abort();
        for neighbour in &self.neighbours {
            neighbour.shutdown().await;
        }
    }
}

fn spawn_sweeper(radio: MockRadio, config: &SimulationConfig) -> JoinHandle<()> {
    let period = config.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            radio.sweep();
        }
    })
}

// ----------------------------------------------------------------------------
// Headless Commands
// ----------------------------------------------------------------------------

/// Start one role, print events for `duration`, then stop it.
///
/// Ctrl+C ends the wait early; the stop command still runs.
pub async fn run_for<A: BleAdapter>(
    controller: Arc<BleSessionController<A>>,
    start: SessionCommand,
    stop: SessionCommand,
    duration: Duration,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<EventLog> {
    let mut bridge = LogBridge::attach(controller.events());
    controller.execute(start).await;

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            entry = bridge.next() => match entry {
                Some(entry) => write_entry(out, format, None, entry)?,
                None => break,
            },
        }
    }

    let printed = bridge.log().len();
    controller.execute(stop).await;
    controller.shutdown().await;
    bridge.pump();
    for entry in &bridge.log().entries()[printed..] {
        write_entry(out, format, None, entry)?;
    }
    bridge.close();

    Ok(bridge.log().clone())
}

// ----------------------------------------------------------------------------
// Demo
// ----------------------------------------------------------------------------

/// What each side of the demo logged
#[derive(Debug)]
pub struct DemoReport {
    pub advertiser: EventLog,
    pub scanner: EventLog,
}

impl DemoReport {
    /// The scanner saw the advertiser, and the advertiser went on air
    pub fn succeeded(&self) -> bool {
        self.advertiser.count(EventKind::AdvertisingStarted) == 1
            && self.scanner.count(EventKind::DeviceDiscovered) >= 1
    }
}

/// Session A advertises, session B scans, one sweep carries A to B
pub async fn run_demo(
    config: &AppConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<DemoReport> {
    let radio = MockRadio::new();
    let name = &config.simulation.device_name;
    let advertiser = BleSessionController::new(
        Some(MockAdapter::new(&radio, format!("{}-a", name))),
        config.session.clone(),
    );
    let scanner = BleSessionController::new(
        Some(MockAdapter::new(&radio, format!("{}-b", name))),
        config.session.clone(),
    );
    let mut advertiser_log = LogBridge::attach(advertiser.events());
    let mut scanner_log = LogBridge::attach(scanner.events());

    advertiser.start_advertising().await;
    scanner.start_scan().await;
    let delivered = radio.sweep();
    debug!("Demo sweep delivered {} results", delivered);

    scanner.stop_scan().await;
    advertiser.stop_advertising().await;

    advertiser_log.pump();
    scanner_log.pump();
    for entry in advertiser_log.log().entries() {
        write_entry(out, format, Some("A"), entry)?;
    }
    for entry in scanner_log.log().entries() {
        write_entry(out, format, Some("B"), entry)?;
    }
    advertiser_log.close();
    scanner_log.close();

    let report = DemoReport {
        advertiser: advertiser_log.log().clone(),
        scanner: scanner_log.log().clone(),
    };
    if !report.succeeded() {
        warn!("Demo finished without the scanner discovering the advertiser");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleloop_core::BleEvent;

    fn entry(event: BleEvent) -> LogEntry {
        LogEntry { seq: 3, event }
    }

    #[test]
    fn test_write_text_and_json() {
        let mut out = Vec::new();
        write_entry(&mut out, OutputFormat::Text, None, &entry(BleEvent::ScanStopped)).unwrap();
        write_entry(&mut out, OutputFormat::Text, Some("B"), &entry(BleEvent::ScanStarted))
            .unwrap();
        write_entry(&mut out, OutputFormat::Json, Some("A"), &entry(BleEvent::ScanStopped))
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "BLE: Stopped scanning.");
        assert_eq!(lines[1], "[B] BLE: Started scanning for advertising devices...");

        let json: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(json["session"], "A");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["event"]["type"], "scan_stopped");
    }

    #[tokio::test]
    async fn test_demo_discovers_itself() {
        let mut out = Vec::new();
        let report = run_demo(&AppConfig::default(), OutputFormat::Text, &mut out)
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.scanner.count(EventKind::DeviceDiscovered), 1);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[A] BLE: Advertising started successfully."));
        assert!(text.contains("[B] Discovered: bleloop-a (RSSI: -59)"));
    }

    #[tokio::test]
    async fn test_run_for_scans_simulated_neighbours() {
        let config = AppConfig {
            simulation: SimulationConfig {
                sweep_interval_ms: 10,
                ..SimulationConfig::default()
            },
            ..AppConfig::default()
        };
        let (simulation, local) = Simulation::start(&config).await;
        let controller = Arc::new(BleSessionController::new(Some(local), config.session.clone()));

        let mut out = Vec::new();
        let log = run_for(
            controller.clone(),
            SessionCommand::StartScan,
            SessionCommand::StopScan,
            Duration::from_millis(100),
            OutputFormat::Text,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(log.count(EventKind::ScanStarted), 1);
        assert_eq!(log.count(EventKind::ScanStopped), 1);
        assert!(log.count(EventKind::DeviceDiscovered) >= 2);
        assert!(!controller.state().scanning);
        assert_eq!(simulation.radio().active_scan_count(), 0);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Discovered: pixel-7"));
        assert!(text.ends_with("BLE: Stopped scanning.\n"));

        simulation.stop().await;
    }

    #[tokio::test]
    async fn test_run_for_advertise_without_adapter() {
        let controller: Arc<BleSessionController<MockAdapter>> =
            Arc::new(BleSessionController::new(None, Default::default()));

        let mut out = Vec::new();
        let log = run_for(
            controller,
            SessionCommand::StartAdvertising,
            SessionCommand::StopAdvertising,
            Duration::from_millis(10),
            OutputFormat::Text,
            &mut out,
        )
        .await
        .unwrap();

        let lines = log.lines();
        assert_eq!(lines[0], "Bluetooth is disabled or not available.");
        assert_eq!(lines[1], "BLE: Stopped advertising.");
    }
}
