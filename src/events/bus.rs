//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] shared by everything
//! that reports on the lifecycle: the state machine, the phase handlers and the
//! orchestrator entry points.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Receivers:
//!   StateMachine ──┐                ┌──► subscriber_listener ──► SubscriberSet
//!   Phases       ──┼──────► Bus ────┤
//!   Entry points ──┘                └──► Orchestrator::bus().subscribe() (callers, tests)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks, so a cascade never waits on an observer.
//! - One ring buffer of `Config::bus_capacity` events is shared by all receivers.
//! - Events sent while nobody is subscribed are gone.
//!
//! ## Capacity behavior
//! A single transition publishes several events (`TransitionStarted`, `StateEntered`,
//! `TransitionCommitted`, plus phase verdicts), and a wake-up cascade with many
//! resources can publish hundreds in one burst. Once the ring is full:
//! - the oldest events are overwritten;
//! - a receiver that fell behind gets `RecvError::Lagged(n)` on its next `recv()`
//!   and resumes from the oldest event still buffered.
//!
//! The subscriber listener skips over a lag; size `bus_capacity` for the largest
//! cascade you expect if subscribers must see every event.

use tokio::sync::broadcast;

use super::event::Event;
use crate::config::Config;

/// Broadcast channel for runtime events.
///
/// Cloning is cheap; every clone publishes into the same ring.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding at most `capacity` events (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Creates a bus sized by [`Config::bus_capacity`].
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.bus_capacity_clamped())
    }

    /// Publishes an event to all active receivers; dropped when there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receivers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Bus::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_receivers_subscribed_before() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ShutdownRequested));

        let ev = rx.recv().await.expect("event delivered");
        assert_eq!(ev.kind, EventKind::ShutdownRequested);
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        assert_eq!(bus.receivers(), 0);
        bus.publish(Event::new(EventKind::ShutdownRequested));
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips_oldest_events() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for state in ["initialize", "check", "activate", "healthy"] {
            bus.publish(Event::new(EventKind::StateEntered).with_state(state));
        }

        match rx.recv().await {
            Err(RecvError::Lagged(n)) => assert_eq!(n, 2),
            other => panic!("expected lag, got {other:?}"),
        }
        let ev = rx.recv().await.expect("buffered");
        assert_eq!(ev.state.as_deref(), Some("activate"));
        let ev = rx.recv().await.expect("buffered");
        assert_eq!(ev.state.as_deref(), Some("healthy"));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_from_config_clamps_capacity() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        let bus = Bus::from_config(&cfg);
        let _rx = bus.subscribe();
        assert_eq!(bus.receivers(), 1);
        bus.publish(Event::new(EventKind::ShutdownRequested));
    }
}
