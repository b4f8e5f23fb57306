//! # Runtime events emitted by the state machine and the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Machine events**: signal lookup, transition attempts, state entries
//! - **Phase events**: per-resource rejections and aggregated verdicts
//! - **Entry point events**: probes, timeouts, termination, shutdown
//! - **Subscriber events**: overflow and panics of subscriber workers
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use vigil::{Event, EventKind, Signal};
//!
//! let ev = Event::new(EventKind::StateEntered)
//!     .with_signal(Signal::Wakeup)
//!     .with_from("check")
//!     .with_state("activate");
//!
//! assert_eq!(ev.kind, EventKind::StateEntered);
//! assert_eq!(ev.state.as_deref(), Some("activate"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::machine::Signal;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Machine events ===
    /// A signal reached the machine.
    ///
    /// Sets: `signal`, `from` (current state)
    SignalReceived,

    /// No rule matched the current state; the signal was dropped.
    ///
    /// Sets: `signal`, `from`
    SignalIgnored,

    /// A transition is about to run the destination's activation handler.
    ///
    /// Sets: `signal`, `from`, `state`
    TransitionAttempt,

    /// The activation handler attached an error to an otherwise successful transition.
    ///
    /// Sets: `signal`, `from`, `state`, `reason`
    TransitionAnnotated,

    /// A state was entered.
    ///
    /// Sets: `signal`, `from`, `state`
    StateEntered,

    /// The success transition failed; the machine falls back to the failure target.
    ///
    /// Sets: `signal`, `from`, `state` (failure target), `reason`
    TransitionFailed,

    /// A signal (and its whole cascade) finished processing.
    ///
    /// Sets: `signal`, `state` (resting state), `reason` (only on error)
    SignalProcessed,

    /// A state listener panicked; remaining listeners still ran.
    ///
    /// Sets: `state`, `reason`
    ListenerPanicked,

    // === Phase events ===
    /// At least one resource hook rejected during a phase.
    ///
    /// Sets: `state` (phase), `resource` (comma-separated names), `reason`
    PhaseRejected,

    /// A phase aggregated its verdicts and decided where to go next.
    ///
    /// Sets: `state` (phase, or `healed`), `resource` (only for `healed`), `reason` (decision)
    PhaseVerdict,

    /// A best-effort hook (`healthcheck`, `stop`, `refresh`, `healed`) failed.
    ///
    /// Sets: `resource`, `reason`
    HookFailed,

    // === Entry point events ===
    /// A healthcheck probe completed.
    ///
    /// Sets: `signal` (`health` or `sick`), `reason` (`healthy` / `unhealthy`)
    HealthcheckCompleted,

    /// A caller-side wait elapsed; the operation keeps running.
    ///
    /// Sets: `reason` (operation), `timeout_ms`
    TimeoutHit,

    /// The terminal state was entered and the terminator is being invoked.
    ///
    /// Sets: `signal`
    Terminating,

    /// An OS shutdown signal (or cancellation) was observed.
    ShutdownRequested,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `resource` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `resource` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Signal being processed, if any.
    pub signal: Option<Signal>,
    /// Destination / current state, rendered.
    pub state: Option<Arc<str>>,
    /// Source state, rendered (`uninitialized` before the first transition).
    pub from: Option<Arc<str>>,
    /// Resource (or subscriber) name.
    pub resource: Option<Arc<str>>,
    /// Human-readable reason (errors, decisions, overflow details).
    pub reason: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            signal: None,
            state: None,
            from: None,
            resource: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches the signal being processed.
    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches the destination (or current) state.
    #[inline]
    pub fn with_state(mut self, state: impl Into<Arc<str>>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Attaches the source state.
    #[inline]
    pub fn with_from(mut self, from: impl Into<Arc<str>>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Attaches a resource name.
    #[inline]
    pub fn with_resource(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_resource(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_resource(subscriber)
            .with_reason(info)
    }

    /// True for events reporting something the operator should look at.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TransitionAnnotated
                | EventKind::TransitionFailed
                | EventKind::ListenerPanicked
                | EventKind::PhaseRejected
                | EventKind::HookFailed
                | EventKind::TimeoutHit
                | EventKind::SubscriberOverflow
                | EventKind::SubscriberPanicked
        ) || (self.kind == EventKind::SignalProcessed && self.reason.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::SignalReceived);
        let b = Event::new(EventKind::SignalReceived);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_timeout_is_stored_in_millis() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_millis(1500));
        assert_eq!(ev.timeout_ms, Some(1500));
    }

    #[test]
    fn test_signal_processed_with_reason_is_failure() {
        let ok = Event::new(EventKind::SignalProcessed).with_state("healthy");
        assert!(!ok.is_failure());

        let failed = ok.clone().with_reason("illegal transition");
        assert!(failed.is_failure());
    }
}
