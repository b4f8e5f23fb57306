//! # StateMachine: table-checked transitions with cascading forwards.
//!
//! See the [module docs](crate::machine) for the transition protocol.
//!
//! ## Example
//! ```rust
//! use vigil::{Forward, HandlerFn, HandlerResult, Signal, StateMachine, Transition, TransitionTable};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), vigil::MachineError> {
//! let table = TransitionTable::builder()
//!     .rule(Signal::Wakeup, None, "boot", "down")
//!     .rule(Signal::Wakeup, "boot", "up", "down")
//!     .build();
//!
//! let machine = StateMachine::builder(table)
//!     .handler("boot", HandlerFn::arc(|_t: Transition<&'static str>| async {
//!         let next: HandlerResult<&'static str> = Ok(Some(Forward::to("up")));
//!         next
//!     }))
//!     .handler("up", HandlerFn::arc(|_t: Transition<&'static str>| async {
//!         let next: HandlerResult<&'static str> = Ok(None);
//!         next
//!     }))
//!     .handler("down", HandlerFn::arc(|_t: Transition<&'static str>| async {
//!         let next: HandlerResult<&'static str> = Ok(None);
//!         next
//!     }))
//!     .build()?;
//!
//! machine.signal(Signal::Wakeup).await?;
//! assert_eq!(machine.state(), Some("up"));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::MachineError;
use crate::events::{Bus, Event, EventKind};

use super::handler::{Forward, HandlerRef, Transition};
use super::listeners::{Listener, Listeners, Notice, Trigger};
use super::signal::{Signal, State, render};
use super::table::TransitionTable;

/// Default bound on forwarding steps per signal.
const DEFAULT_MAX_FORWARDS: usize = 16;

/// Current state plus one-shot waiters for future entries.
struct Current<S> {
    state: Option<S>,
    waiters: Vec<(S, oneshot::Sender<()>)>,
}

/// Generic signal-driven state machine.
pub struct StateMachine<S: State> {
    table: TransitionTable<S>,
    handlers: HashMap<S, HandlerRef<S>>,
    current: Mutex<Current<S>>,
    listeners: Listeners<S>,
    /// Serializes whole signal cascades.
    gate: tokio::sync::Mutex<()>,
    bus: Bus,
    max_forwards: usize,
}

impl<S: State> StateMachine<S> {
    /// Starts a builder around a transition table.
    pub fn builder(table: TransitionTable<S>) -> StateMachineBuilder<S> {
        StateMachineBuilder {
            table,
            handlers: HashMap::new(),
            listeners: Vec::new(),
            bus: None,
            max_forwards: DEFAULT_MAX_FORWARDS,
        }
    }

    /// Current state; `None` until the first transition commits.
    pub fn state(&self) -> Option<S> {
        self.lock_current().state
    }

    /// The transition table the machine enforces.
    pub fn table(&self) -> &TransitionTable<S> {
        &self.table
    }

    /// True when `signal` may move the machine from `from` to `to`.
    pub fn is_transition_allowed(&self, signal: Signal, from: Option<S>, to: S) -> bool {
        self.table.is_allowed(signal, from, to)
    }

    /// Registers a listener. Listeners for the same occurrence fire in registration order.
    pub fn on<F>(&self, trigger: Trigger<S>, listener: F)
    where
        F: Fn(&Notice<S>) + Send + Sync + 'static,
    {
        self.listeners.add(trigger, Arc::new(listener));
    }

    /// Waits for the next entry into `state`.
    ///
    /// Resolves immediately when `state` is current at call time. Otherwise a one-shot
    /// waiter is registered right away (before the returned future is polled), so an
    /// entry happening between this call and the first poll is not missed. The future
    /// also resolves if the machine is dropped.
    pub fn await_state(&self, state: S) -> impl Future<Output = ()> + Send + 'static {
        let rx = {
            let mut current = self.lock_current();
            if current.state == Some(state) {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                current.waiters.push((state, tx));
                Some(rx)
            }
        };
        async move {
            if let Some(rx) = rx {
                let _ = rx.await;
            }
        }
    }

    /// Processes one signal, including the whole forwarding cascade it triggers.
    ///
    /// - no rule for the current state → `Ok(())`, nothing happens
    /// - success target reached → `Ok(())`
    /// - success attempt failed → the failure target is tried from whatever state the
    ///   machine is in now; its outcome is returned
    pub async fn signal(&self, signal: Signal) -> Result<(), MachineError> {
        let _gate = self.gate.lock().await;

        let current = self.state();
        self.bus.publish(
            Event::new(EventKind::SignalReceived)
                .with_signal(signal)
                .with_from(render(current)),
        );

        let Some(rule) = self.table.lookup(signal, current).copied() else {
            self.bus.publish(
                Event::new(EventKind::SignalIgnored)
                    .with_signal(signal)
                    .with_from(render(current)),
            );
            return Ok(());
        };

        let result = match self.try_change_state(current, rule.success, signal, 0).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let now = self.state();
                self.bus.publish(
                    Event::new(EventKind::TransitionFailed)
                        .with_signal(signal)
                        .with_from(render(now))
                        .with_state(rule.failure.to_string())
                        .with_reason(err.to_string()),
                );
                self.try_change_state(now, rule.failure, signal, 0).await
            }
        };

        let state = self.state();
        let mut ev = Event::new(EventKind::SignalProcessed)
            .with_signal(signal)
            .with_state(render(state));
        if let Err(err) = &result {
            ev = ev.with_reason(err.to_string());
        }
        self.bus.publish(ev);
        self.listeners.notify(
            &Notice::SignalProcessed {
                signal,
                state,
                ok: result.is_ok(),
            },
            &self.bus,
        );

        result
    }

    /// Validates, activates, commits, then follows any forward.
    fn try_change_state(
        &self,
        from: Option<S>,
        to: S,
        signal: Signal,
        depth: usize,
    ) -> BoxFuture<'_, Result<(), MachineError>> {
        async move {
            if depth > self.max_forwards {
                return Err(MachineError::ForwardLimit {
                    signal,
                    limit: self.max_forwards,
                });
            }

            self.bus.publish(
                Event::new(EventKind::TransitionAttempt)
                    .with_signal(signal)
                    .with_from(render(from))
                    .with_state(to.to_string()),
            );

            if !self.table.is_allowed(signal, from, to) {
                return Err(MachineError::IllegalTransition {
                    signal,
                    from: render(from),
                    to: to.to_string(),
                });
            }

            let handler = self
                .handlers
                .get(&to)
                .cloned()
                .ok_or_else(|| MachineError::UnknownState {
                    state: to.to_string(),
                })?;

            let transition = Transition { from, to, signal };
            let forward = handler
                .activate(transition)
                .await
                .map_err(|source| MachineError::Handler {
                    state: to.to_string(),
                    source,
                })?;
            self.listeners
                .notify(&Notice::Activated(transition), &self.bus);

            if let Some(Forward {
                error: Some(err), ..
            }) = &forward
            {
                self.bus.publish(
                    Event::new(EventKind::TransitionAnnotated)
                        .with_signal(signal)
                        .with_from(render(from))
                        .with_state(to.to_string())
                        .with_reason(err.to_string()),
                );
            }

            self.commit(transition);

            match forward {
                Some(next) => {
                    self.try_change_state(Some(to), next.to, signal, depth + 1)
                        .await
                }
                None => Ok(()),
            }
        }
        .boxed()
    }

    fn commit(&self, transition: Transition<S>) {
        if transition.from.is_some() {
            self.listeners
                .notify(&Notice::Deactivated(transition), &self.bus);
        }

        let ready = {
            let mut current = self.lock_current();
            current.state = Some(transition.to);
            let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut current.waiters)
                .into_iter()
                .partition(|(state, _)| *state == transition.to);
            current.waiters = pending
                .into_iter()
                .filter(|(_, tx)| !tx.is_closed())
                .collect();
            ready
        };
        for (_, tx) in ready {
            let _ = tx.send(());
        }

        self.listeners
            .notify(&Notice::Entered(transition), &self.bus);
        self.bus.publish(
            Event::new(EventKind::StateEntered)
                .with_signal(transition.signal)
                .with_from(render(transition.from))
                .with_state(transition.to.to_string()),
        );
    }

    fn lock_current(&self) -> MutexGuard<'_, Current<S>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`StateMachine`].
pub struct StateMachineBuilder<S: State> {
    table: TransitionTable<S>,
    handlers: HashMap<S, HandlerRef<S>>,
    listeners: Vec<(Trigger<S>, Listener<S>)>,
    bus: Option<Bus>,
    max_forwards: usize,
}

impl<S: State> StateMachineBuilder<S> {
    /// Sets the activation handler of `state` (replacing any previous one).
    pub fn handler(mut self, state: S, handler: HandlerRef<S>) -> Self {
        self.handlers.insert(state, handler);
        self
    }

    /// Registers a listener before construction; the only way to observe
    /// [`Trigger::Constructed`].
    pub fn on<F>(mut self, trigger: Trigger<S>, listener: F) -> Self
    where
        F: Fn(&Notice<S>) + Send + Sync + 'static,
    {
        self.listeners.push((trigger, Arc::new(listener)));
        self
    }

    /// Publishes machine events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Bounds the forwarding chain of a single signal.
    pub fn max_forwards(mut self, max_forwards: usize) -> Self {
        self.max_forwards = max_forwards;
        self
    }

    /// Validates the table against the handlers and builds the machine.
    ///
    /// Every success or failure target must have a handler.
    pub fn build(self) -> Result<StateMachine<S>, MachineError> {
        if let Some(missing) = self
            .table
            .targets()
            .find(|s| !self.handlers.contains_key(s))
        {
            return Err(MachineError::UnknownState {
                state: missing.to_string(),
            });
        }

        let machine = StateMachine {
            table: self.table,
            handlers: self.handlers,
            current: Mutex::new(Current {
                state: None,
                waiters: Vec::new(),
            }),
            listeners: Listeners::new(self.listeners),
            gate: tokio::sync::Mutex::new(()),
            bus: self.bus.unwrap_or_default(),
            max_forwards: self.max_forwards,
        };
        machine.listeners.notify(&Notice::Constructed, &machine.bus);
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::machine::{HandlerFn, HandlerResult};
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Lamp {
        Boot,
        On,
        Dim,
        Broken,
    }

    impl fmt::Display for Lamp {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn rest() -> HandlerRef<Lamp> {
        HandlerFn::arc(|_t: Transition<Lamp>| async {
            let r: HandlerResult<Lamp> = Ok(None);
            r
        })
    }

    fn forward(to: Lamp) -> HandlerRef<Lamp> {
        HandlerFn::arc(move |_t: Transition<Lamp>| async move {
            let r: HandlerResult<Lamp> = Ok(Some(Forward::to(to)));
            r
        })
    }

    fn failing() -> HandlerRef<Lamp> {
        HandlerFn::arc(|_t: Transition<Lamp>| async {
            let r: HandlerResult<Lamp> = Err(BoxError::from("bulb missing"));
            r
        })
    }

    fn table() -> TransitionTable<Lamp> {
        TransitionTable::builder()
            .rule(Signal::Wakeup, None, Lamp::Boot, Lamp::Broken)
            .rule(Signal::Wakeup, Lamp::Boot, Lamp::On, Lamp::Broken)
            .rule(Signal::Sick, Lamp::On, Lamp::Dim, Lamp::Broken)
            .rule(Signal::Health, Lamp::On, Lamp::On, Lamp::Broken)
            .build()
    }

    fn machine(boot: HandlerRef<Lamp>, on: HandlerRef<Lamp>) -> StateMachine<Lamp> {
        StateMachine::builder(table())
            .handler(Lamp::Boot, boot)
            .handler(Lamp::On, on)
            .handler(Lamp::Dim, rest())
            .handler(Lamp::Broken, rest())
            .build()
            .expect("valid table")
    }

    #[tokio::test]
    async fn test_starts_uninitialized_and_ignores_unmatched_signals() {
        let m = machine(rest(), rest());
        assert_eq!(m.state(), None);

        m.signal(Signal::Stop).await.expect("ignored");
        m.signal(Signal::Sick).await.expect("ignored");
        assert_eq!(m.state(), None);
    }

    #[tokio::test]
    async fn test_forward_cascades_within_one_signal() {
        let m = machine(forward(Lamp::On), rest());
        let entered = Arc::new(Mutex::new(Vec::new()));
        {
            let entered = Arc::clone(&entered);
            m.on(Trigger::AnyEntered, move |n| {
                if let Some(t) = n.transition() {
                    entered.lock().unwrap().push((t.from, t.to));
                }
            });
        }

        m.signal(Signal::Wakeup).await.expect("cascade");

        assert_eq!(m.state(), Some(Lamp::On));
        assert_eq!(
            *entered.lock().unwrap(),
            [(None, Lamp::Boot), (Some(Lamp::Boot), Lamp::On)]
        );
    }

    #[tokio::test]
    async fn test_handler_error_falls_back_to_failure_target() {
        let m = machine(failing(), rest());
        m.signal(Signal::Wakeup).await.expect("fallback succeeds");
        assert_eq!(m.state(), Some(Lamp::Broken));
    }

    #[tokio::test]
    async fn test_illegal_forward_falls_back_from_committed_state() {
        // Boot forwards to Dim, which wakeup never allows from Boot.
        let m = machine(forward(Lamp::Dim), rest());
        m.signal(Signal::Wakeup).await.expect("fallback succeeds");
        assert_eq!(m.state(), Some(Lamp::Broken));
    }

    #[tokio::test]
    async fn test_failed_fallback_surfaces_illegal_transition() {
        // On forwards to Boot: illegal. Fallback On -> Broken has no wakeup rule either.
        let m = machine(forward(Lamp::On), forward(Lamp::Boot));
        let err = m.signal(Signal::Wakeup).await.expect_err("no legal fallback");
        assert!(err.is_illegal_transition(), "{err}");
        assert_eq!(m.state(), Some(Lamp::On));
    }

    #[tokio::test]
    async fn test_annotation_is_logged_and_does_not_block() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let boot = HandlerFn::arc(|_t: Transition<Lamp>| async {
            let r: HandlerResult<Lamp> = Ok(Some(Forward::to(Lamp::On).with_error("degraded boot")));
            r
        });
        let m = StateMachine::builder(table())
            .handler(Lamp::Boot, boot)
            .handler(Lamp::On, rest())
            .handler(Lamp::Dim, rest())
            .handler(Lamp::Broken, rest())
            .with_bus(bus)
            .build()
            .expect("valid table");

        m.signal(Signal::Wakeup).await.expect("cascade");
        assert_eq!(m.state(), Some(Lamp::On));

        let mut annotated = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TransitionAnnotated {
                annotated = Some(ev);
            }
        }
        let ev = annotated.expect("annotation published");
        assert_eq!(ev.state.as_deref(), Some("Boot"));
        assert_eq!(ev.reason.as_deref(), Some("degraded boot"));
    }

    #[tokio::test]
    async fn test_forward_limit_falls_back_to_failure_target() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        // On rests on wakeup but keeps re-entering itself on health.
        let on = HandlerFn::arc(|t: Transition<Lamp>| async move {
            let r: HandlerResult<Lamp> = match t.signal {
                Signal::Health => Ok(Some(Forward::to(Lamp::On))),
                _ => Ok(None),
            };
            r
        });
        let m = StateMachine::builder(table())
            .handler(Lamp::Boot, forward(Lamp::On))
            .handler(Lamp::On, on)
            .handler(Lamp::Dim, rest())
            .handler(Lamp::Broken, rest())
            .max_forwards(3)
            .with_bus(bus)
            .build()
            .expect("valid table");

        m.signal(Signal::Wakeup).await.expect("boot");
        assert_eq!(m.state(), Some(Lamp::On));

        m.signal(Signal::Health).await.expect("fallback succeeds");
        assert_eq!(m.state(), Some(Lamp::Broken));

        let mut failed = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TransitionFailed {
                failed = Some(ev);
            }
        }
        let ev = failed.expect("limit reported");
        assert_eq!(ev.reason.as_deref(), Some("health cascade exceeded 3 forwards"));
    }

    #[tokio::test]
    async fn test_await_state_resolves_immediately_when_current() {
        let m = machine(rest(), rest());
        m.signal(Signal::Wakeup).await.expect("boot");
        assert_eq!(m.state(), Some(Lamp::Boot));

        tokio::time::timeout(Duration::from_millis(50), m.await_state(Lamp::Boot))
            .await
            .expect("already in Boot");
    }

    #[tokio::test]
    async fn test_await_state_resolves_on_next_entry() {
        let m = Arc::new(machine(forward(Lamp::On), rest()));
        let wait = m.await_state(Lamp::On);

        let driver = Arc::clone(&m);
        tokio::spawn(async move { driver.signal(Signal::Wakeup).await });

        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("On entered");
        assert_eq!(m.state(), Some(Lamp::On));
    }

    #[tokio::test]
    async fn test_build_rejects_target_without_handler() {
        let err = StateMachine::builder(table())
            .handler(Lamp::Boot, rest())
            .handler(Lamp::On, rest())
            .build()
            .err()
            .expect("missing handlers");
        assert!(matches!(err, MachineError::UnknownState { .. }));
    }

    #[tokio::test]
    async fn test_constructed_listener_fires_once_on_build() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let m = StateMachine::builder(table())
            .handler(Lamp::Boot, rest())
            .handler(Lamp::On, rest())
            .handler(Lamp::Dim, rest())
            .handler(Lamp::Broken, rest())
            .on(Trigger::Constructed, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .expect("valid table");

        m.signal(Signal::Wakeup).await.expect("boot");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deactivated_and_signal_listeners() {
        let m = machine(forward(Lamp::On), rest());
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let log = Arc::clone(&log);
            m.on(Trigger::Deactivated(Lamp::Boot), move |_| {
                log.lock().unwrap().push("left boot")
            });
        }
        {
            let log = Arc::clone(&log);
            m.on(Trigger::Signal(Signal::Wakeup), move |n| {
                if let Notice::SignalProcessed { ok: true, .. } = n {
                    log.lock().unwrap().push("wakeup done")
                }
            });
        }

        m.signal(Signal::Wakeup).await.expect("cascade");
        assert_eq!(*log.lock().unwrap(), ["left boot", "wakeup done"]);
    }
}
