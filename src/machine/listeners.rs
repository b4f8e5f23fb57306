//! # Listener registry.
//!
//! Synchronous callbacks keyed by [`Trigger`]. Listeners for the same occurrence
//! run in registration order, wildcard and specific ones interleaved as registered.
//! A panicking listener is reported as `ListenerPanicked` and the others still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::HookError;
use crate::events::{Bus, Event, EventKind};

use super::handler::Transition;
use super::signal::{Signal, State, render};

/// What a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger<S> {
    /// The machine was built (only reachable for listeners given to the builder).
    Constructed,
    /// A specific state was entered (fires on every entry, re-entries included).
    Entered(S),
    /// Any state was entered.
    AnyEntered,
    /// The handler of a specific state completed successfully.
    Activated(S),
    /// Any handler completed successfully.
    AnyActivated,
    /// A specific state is being left.
    Deactivated(S),
    /// Any state is being left.
    AnyDeactivated,
    /// A specific signal finished processing.
    Signal(Signal),
    /// Any signal finished processing.
    AnySignal,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice<S> {
    /// The machine was built.
    Constructed,
    /// `transition.to`'s handler completed; the state is not committed yet.
    Activated(Transition<S>),
    /// `transition.to` was committed.
    Entered(Transition<S>),
    /// `transition.from` is being left for `transition.to`.
    Deactivated(Transition<S>),
    /// A signal and its cascade settled.
    SignalProcessed {
        /// The signal.
        signal: Signal,
        /// Resting state afterwards.
        state: Option<S>,
        /// Whether processing returned `Ok`.
        ok: bool,
    },
}

impl<S: State> Notice<S> {
    /// The transition behind this notice, if any.
    pub fn transition(&self) -> Option<&Transition<S>> {
        match self {
            Notice::Activated(t) | Notice::Entered(t) | Notice::Deactivated(t) => Some(t),
            Notice::Constructed | Notice::SignalProcessed { .. } => None,
        }
    }

    fn matches(&self, trigger: &Trigger<S>) -> bool {
        match (self, trigger) {
            (Notice::Constructed, Trigger::Constructed) => true,
            (Notice::Entered(_), Trigger::AnyEntered) => true,
            (Notice::Entered(t), Trigger::Entered(s)) => t.to == *s,
            (Notice::Activated(_), Trigger::AnyActivated) => true,
            (Notice::Activated(t), Trigger::Activated(s)) => t.to == *s,
            (Notice::Deactivated(_), Trigger::AnyDeactivated) => true,
            (Notice::Deactivated(t), Trigger::Deactivated(s)) => t.from == Some(*s),
            (Notice::SignalProcessed { .. }, Trigger::AnySignal) => true,
            (Notice::SignalProcessed { signal, .. }, Trigger::Signal(s)) => signal == s,
            _ => false,
        }
    }

    fn subject(&self) -> String {
        match self {
            Notice::Constructed => "constructed".to_string(),
            Notice::Activated(t) | Notice::Entered(t) => t.to.to_string(),
            Notice::Deactivated(t) => render(t.from),
            Notice::SignalProcessed { signal, .. } => signal.to_string(),
        }
    }
}

/// Listener callback.
pub type Listener<S> = Arc<dyn Fn(&Notice<S>) + Send + Sync>;

pub(crate) struct Listeners<S> {
    entries: RwLock<Vec<(Trigger<S>, Listener<S>)>>,
}

impl<S: State> Listeners<S> {
    pub(crate) fn new(entries: Vec<(Trigger<S>, Listener<S>)>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub(crate) fn add(&self, trigger: Trigger<S>, listener: Listener<S>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((trigger, listener));
    }

    /// Runs every matching listener outside the lock, isolating panics.
    pub(crate) fn notify(&self, notice: &Notice<S>, bus: &Bus) {
        let matching: Vec<Listener<S>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(trigger, _)| notice.matches(trigger))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in matching {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(notice))) {
                bus.publish(
                    Event::new(EventKind::ListenerPanicked)
                        .with_state(notice.subject())
                        .with_reason(HookError::from_panic(panic).to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn step(from: Option<&'static str>, to: &'static str) -> Transition<&'static str> {
        Transition {
            from,
            to,
            signal: Signal::Wakeup,
        }
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listeners = Listeners::new(Vec::new());
        for (tag, trigger) in [
            ("any", Trigger::AnyEntered),
            ("up", Trigger::Entered("up")),
            ("down", Trigger::Entered("down")),
        ] {
            let seen = Arc::clone(&seen);
            listeners.add(trigger, Arc::new(move |_: &Notice<&'static str>| {
                seen.lock().unwrap().push(tag)
            }));
        }

        listeners.notify(&Notice::Entered(step(None, "up")), &Bus::new(1));
        assert_eq!(*seen.lock().unwrap(), ["any", "up"]);
    }

    #[test]
    fn test_deactivated_matches_source_state() {
        let notice = Notice::Deactivated(step(Some("up"), "down"));
        assert!(notice.matches(&Trigger::Deactivated("up")));
        assert!(!notice.matches(&Trigger::Deactivated("down")));
        assert!(notice.matches(&Trigger::AnyDeactivated));
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_stop_others() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let ran = Arc::new(Mutex::new(false));
        let listeners = Listeners::new(Vec::new());
        fn boom(_: &Notice<&'static str>) {
            panic!("listener bug")
        }
        listeners.add(Trigger::AnyEntered, Arc::new(boom));
        {
            let ran = Arc::clone(&ran);
            listeners.add(Trigger::AnyEntered, Arc::new(move |_: &Notice<&'static str>| {
                *ran.lock().unwrap() = true
            }));
        }

        listeners.notify(&Notice::Entered(step(None, "up")), &bus);

        assert!(*ran.lock().unwrap());
        let ev = rx.recv().await.expect("panic report");
        assert_eq!(ev.kind, EventKind::ListenerPanicked);
        assert_eq!(ev.state.as_deref(), Some("up"));
    }
}
