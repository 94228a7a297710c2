//! Log event channel between the session controller and the UI
//!
//! Every subscriber gets its own unbounded queue, so delivery is lossless and
//! preserves emission order. Subscribers that went away are pruned on the
//! next emit.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use crate::event::BleEvent;
use crate::protocol::LOG_EVENT_NAME;

// ----------------------------------------------------------------------------
// Event Bus
// ----------------------------------------------------------------------------

/// Cloneable handle to the `bleLog` event channel
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<BleEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the channel, as seen by UI listeners
    pub fn name(&self) -> &'static str {
        LOG_EVENT_NAME
    }

    /// Register a new listener; it only receives events emitted after this call
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        Subscription { receiver: rx }
    }

    /// Deliver an event to every current subscriber
    pub fn emit(&self, event: BleEvent) {
        debug!(channel = LOG_EVENT_NAME, "{}", event);

        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<BleEvent>>> {
        // A panic while holding the lock cannot leave the list half-updated.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ----------------------------------------------------------------------------
// Subscription
// ----------------------------------------------------------------------------

/// Receiving end of a bus registration; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<BleEvent>,
}

impl Subscription {
    /// Wait for the next event; `None` once every bus handle is gone
    pub async fn recv(&mut self) -> Option<BleEvent> {
        self.receiver.recv().await
    }

    /// Take an already delivered event without waiting
    pub fn try_recv(&mut self) -> Option<BleEvent> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving events
    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_all_subscribers_in_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(BleEvent::ScanStarted);
        bus.emit(BleEvent::ScanStopped);

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.try_recv(), Some(BleEvent::ScanStarted));
            assert_eq!(sub.try_recv(), Some(BleEvent::ScanStopped));
            assert_eq!(sub.try_recv(), None);
        }
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.emit(BleEvent::AdvertisingStopped);

        let mut sub = bus.subscribe();
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let _kept = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        sub.unsubscribe();
        bus.emit(BleEvent::ScanStarted);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_recv_waits_for_emit() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        let emitter = bus.clone();
        tokio::spawn(async move {
            emitter.emit(BleEvent::AdvertisingStarted);
        });

        assert_eq!(sub.recv().await, Some(BleEvent::AdvertisingStarted));
    }

    #[test]
    fn test_recv_pending_until_emit() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let mut recv = task::spawn(sub.recv());

        assert_pending!(recv.poll());
        bus.emit(BleEvent::ScanStopped);
        assert!(recv.is_woken());
        assert_ready_eq!(recv.poll(), Some(BleEvent::ScanStopped));
    }
}
