//! UI side of the event channel: the append-only log and the toggle shell

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::bus::{EventBus, Subscription};
use crate::controller::{BleSessionController, SessionCommand, SessionState};
use crate::event::{BleEvent, EventKind};
use crate::platform::BleAdapter;

// ----------------------------------------------------------------------------
// Event Log
// ----------------------------------------------------------------------------

/// One received event, numbered by arrival
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub seq: u64,
    pub event: BleEvent,
}

/// Ordered, append-only record of received events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: BleEvent) -> &LogEntry {
        let seq = self.entries.len() as u64;
        self.entries.push(LogEntry { seq, event });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Display text of every entry, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.event.to_string()).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.entries.iter().filter(|e| e.event.kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Log Bridge
// ----------------------------------------------------------------------------

/// Subscribes to the bus once and appends everything it receives to a log
#[derive(Debug)]
pub struct LogBridge {
    subscription: Option<Subscription>,
    log: EventLog,
}

impl LogBridge {
    pub fn attach(bus: &EventBus) -> Self {
        Self {
            subscription: Some(bus.subscribe()),
            log: EventLog::new(),
        }
    }

    /// Move every already delivered event into the log; returns how many
    pub fn pump(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let mut received = 0;
        while let Some(event) = subscription.try_recv() {
            self.log.push(event);
            received += 1;
        }
        received
    }

    /// Wait for the next event and append it
    pub async fn next(&mut self) -> Option<&LogEntry> {
        let event = self.subscription.as_mut()?.recv().await?;
        Some(self.log.push(event))
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Unsubscribe; the log keeps what was received
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

// ----------------------------------------------------------------------------
// Shell
// ----------------------------------------------------------------------------

type QueuedCommand = (SessionCommand, oneshot::Sender<()>);

/// Single worker running a shell's commands in the order they were issued
struct CommandQueue {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    worker: JoinHandle<()>,
}

impl CommandQueue {
    fn spawn<A: BleAdapter>(controller: Arc<BleSessionController<A>>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<QueuedCommand>();
        let worker = tokio::spawn(async move {
            while let Some((command, done)) = receiver.recv().await {
                controller.execute(command).await;
                let _ = done.send(());
            }
        });
        Self { sender, worker }
    }
}

/// Two toggles and a log, driving one controller.
///
/// The toggle flags mirror what was *requested*; they flip immediately and
/// are never corrected by controller events. Commands run one at a time on a
/// background worker, in press order.
pub struct Shell<A: BleAdapter> {
    controller: Arc<BleSessionController<A>>,
    bridge: LogBridge,
    queue: Option<CommandQueue>,
    scanning: bool,
    advertising: bool,
}

impl<A: BleAdapter> Shell<A> {
    pub fn new(controller: Arc<BleSessionController<A>>) -> Self {
        let bridge = LogBridge::attach(controller.events());
        Self {
            controller,
            bridge,
            queue: None,
            scanning: false,
            advertising: false,
        }
    }

    pub fn controller(&self) -> &Arc<BleSessionController<A>> {
        &self.controller
    }

    /// Locally tracked toggle state
    pub fn toggles(&self) -> SessionState {
        SessionState {
            scanning: self.scanning,
            advertising: self.advertising,
        }
    }

    /// Queue start or stop scan depending on the local flag. The returned
    /// receiver resolves once the command has run.
    pub fn toggle_scan(&mut self) -> oneshot::Receiver<()> {
        let command = if self.scanning {
            SessionCommand::StopScan
        } else {
            SessionCommand::StartScan
        };
        self.scanning = !self.scanning;
        self.dispatch(command)
    }

    /// Issue start or stop advertising depending on the local flag
    pub fn toggle_advertising(&mut self) -> oneshot::Receiver<()> {
        let command = if self.advertising {
            SessionCommand::StopAdvertising
        } else {
            SessionCommand::StartAdvertising
        };
        self.advertising = !self.advertising;
        self.dispatch(command)
    }

    /// Pull pending events into the log
    pub fn refresh(&mut self) -> usize {
        self.bridge.pump()
    }

    pub fn log(&self) -> &EventLog {
        self.bridge.log()
    }

    pub fn bridge_mut(&mut self) -> &mut LogBridge {
        &mut self.bridge
    }

    /// Finish queued commands, stop active roles and detach from the bus
    pub async fn close(&mut self) {
        if let Some(CommandQueue { sender, worker }) = self.queue.take() {
            drop(sender);
            if let Err(e) = worker.await {
                warn!("Shell command worker failed: {}", e);
            }
        }
        self.controller.shutdown().await;
        self.bridge.pump();
        self.bridge.close();
    }

    fn dispatch(&mut self, command: SessionCommand) -> oneshot::Receiver<()> {
        let (done, finished) = oneshot::channel();
        let controller = &self.controller;
        let queue = self
            .queue
            .get_or_insert_with(|| CommandQueue::spawn(Arc::clone(controller)));
        if queue.sender.send((command, done)).is_err() {
            warn!("Shell command worker is gone, dropping {:?}", command);
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::mock::{MockAdapter, MockAdvertiser, MockRadio, MockScanner};

    /// Mock adapter that yields to the scheduler while checking power
    struct SlowPowerAdapter(MockAdapter);

    #[async_trait::async_trait]
    impl BleAdapter for SlowPowerAdapter {
        type Scanner = MockScanner;
        type Advertiser = MockAdvertiser;

        fn platform(&self) -> &str {
            self.0.platform()
        }

        async fn is_enabled(&self) -> bool {
            tokio::task::yield_now().await;
            self.0.is_enabled().await
        }

        async fn scanner(&self) -> Option<MockScanner> {
            self.0.scanner().await
        }

        async fn advertiser(&self) -> Option<MockAdvertiser> {
            self.0.advertiser().await
        }
    }

    #[test]
    fn test_log_numbers_entries_by_arrival() {
        let mut log = EventLog::new();
        log.push(BleEvent::ScanStarted);
        log.push(BleEvent::ScanStarted);
        let last = log.push(BleEvent::ScanStopped).clone();

        assert_eq!(last.seq, 2);
        assert_eq!(log.count(EventKind::ScanStarted), 2);
        assert_eq!(
            log.lines(),
            vec![
                "BLE: Started scanning for advertising devices...",
                "BLE: Started scanning for advertising devices...",
                "BLE: Stopped scanning.",
            ]
        );
    }

    #[test]
    fn test_closed_bridge_stops_receiving() {
        let bus = EventBus::new();
        let mut bridge = LogBridge::attach(&bus);

        bus.emit(BleEvent::AdvertisingStopped);
        assert_eq!(bridge.pump(), 1);

        bridge.close();
        bus.emit(BleEvent::AdvertisingStopped);
        assert_eq!(bridge.pump(), 0);
        assert_eq!(bridge.log().len(), 1);
        assert!(!bridge.is_attached());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_toggles_flip_without_acknowledgement() {
        let radio = MockRadio::new();
        let adapter = MockAdapter::new(&radio, "shell").powered_off();
        let controller = Arc::new(BleSessionController::new(
            Some(adapter),
            ControllerConfig::default(),
        ));
        let mut shell = Shell::new(controller);

        shell.toggle_scan().await.unwrap();
        assert!(shell.toggles().scanning);
        assert!(!shell.controller().state().scanning);

        shell.refresh();
        assert_eq!(shell.log().count(EventKind::Failed), 1);

        shell.toggle_scan().await.unwrap();
        assert!(!shell.toggles().scanning);
    }

    #[tokio::test]
    async fn test_double_toggle_runs_in_press_order() {
        let radio = MockRadio::new();
        let controller = Arc::new(BleSessionController::new(
            Some(SlowPowerAdapter(MockAdapter::new(&radio, "shell"))),
            ControllerConfig::default(),
        ));
        let mut shell = Shell::new(controller);

        let started = shell.toggle_scan();
        let stopped = shell.toggle_scan();
        started.await.unwrap();
        stopped.await.unwrap();

        assert!(!shell.toggles().scanning);
        assert!(!shell.controller().state().scanning);
        assert_eq!(radio.active_scan_count(), 0);

        shell.refresh();
        assert_eq!(
            shell.log().lines(),
            vec![
                "BLE: Started scanning for advertising devices...",
                "BLE: Stopped scanning.",
            ]
        );
    }

    #[tokio::test]
    async fn test_close_finishes_queued_commands() {
        let radio = MockRadio::new();
        let controller = Arc::new(BleSessionController::new(
            Some(SlowPowerAdapter(MockAdapter::new(&radio, "shell"))),
            ControllerConfig::default(),
        ));
        let mut shell = Shell::new(controller);

        let _ = shell.toggle_advertising();
        let _ = shell.toggle_scan();
        shell.close().await;

        assert_eq!(radio.active_scan_count(), 0);
        assert_eq!(radio.active_advertisement_count(), 0);
        assert_eq!(shell.log().count(EventKind::AdvertisingStarted), 1);
        assert_eq!(shell.log().count(EventKind::ScanStopped), 1);
        assert_eq!(shell.log().count(EventKind::AdvertisingStopped), 1);
    }

    #[tokio::test]
    async fn test_next_waits_for_event() {
        let bus = EventBus::new();
        let mut bridge = LogBridge::attach(&bus);

        let emitter = bus.clone();
        tokio::spawn(async move { emitter.emit(BleEvent::ScanStarted) });

        let entry = bridge.next().await.unwrap();
        assert_eq!(entry.seq, 0);
        assert_eq!(entry.event, BleEvent::ScanStarted);
    }
}
