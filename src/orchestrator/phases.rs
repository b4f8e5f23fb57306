//! # Phase handlers.
//!
//! One [`StateHandler`] per [`Mood`]. Every phase fans out over all resources, waits
//! for all of them to settle, then decides:
//!
//! ```text
//! any rejection ──────────────────────────────► terminate  (Rejected: only the rejecting resources)
//! initialize: commit staged values ───────────► check
//! check:      AND(check) ─ false ─────────────► terminate  (CheckFailed)
//!                        └ true ──────────────► activate
//! activate:   OR(kill) ─ true ────────────────► terminate  (Verdicts)
//!             AND(healthy) ─ false ───────────► sick       (Verdicts)
//!                          └ true ────────────► healthy
//! healthy:    rest
//! sick:       OR(kill) ─ true ────────────────► terminate  (Killers)
//!                      └ false ───────────────► rest
//! terminate:  terminator(signal), rest
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{HookError, PhaseFailure};
use crate::events::{Bus, Event, EventKind};
use crate::machine::{Forward, HandlerResult, Signal, StateHandler, Transition};

use super::mood::Mood;
use super::registry::{Registry, Settled};
use super::resource::Verdict;
use super::terminator::Terminator;

/// Shared state of all phase handlers.
pub(crate) struct Phases {
    registry: Arc<Registry>,
    terminator: Arc<dyn Terminator>,
    bus: Bus,
}

/// The handler registered for one mood.
pub(crate) struct Phase {
    mood: Mood,
    phases: Arc<Phases>,
}

impl Phases {
    pub(crate) fn new(
        registry: Arc<Registry>,
        terminator: Arc<dyn Terminator>,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            terminator,
            bus,
        })
    }

    /// One handler per mood, sharing `self`.
    pub(crate) fn handlers(self: &Arc<Self>) -> impl Iterator<Item = (Mood, Arc<Phase>)> + '_ {
        Mood::ALL.into_iter().map(move |mood| {
            (
                mood,
                Arc::new(Phase {
                    mood,
                    phases: Arc::clone(self),
                }),
            )
        })
    }

    async fn initialize(&self, signal: Signal) -> Forward<Mood> {
        let settled = self
            .registry
            .fan_out(|r| async move { r.need(signal).await })
            .await;
        match self.split(Mood::Initialize, settled) {
            Ok(_) => {
                self.registry.commit_all();
                self.decide(Mood::Initialize, Mood::Check, "values installed")
            }
            Err(rejected) => {
                self.registry.discard_all();
                rejected
            }
        }
    }

    async fn check(&self, signal: Signal) -> Forward<Mood> {
        let settled = self
            .registry
            .fan_out(|r| async move { r.check(signal).await })
            .await;
        let checks: BTreeMap<String, bool> = match self.split(Mood::Check, settled) {
            Ok(ok) => ok.into_iter().map(|(name, ok)| (name.to_string(), ok)).collect(),
            Err(rejected) => return rejected,
        };

        if checks.values().all(|ok| *ok) {
            self.decide(Mood::Check, Mood::Activate, "all checks passed")
        } else {
            self.decide(Mood::Check, Mood::Terminate, "check failed")
                .with_error(PhaseFailure::CheckFailed { checks })
        }
    }

    async fn activate(&self, signal: Signal) -> Forward<Mood> {
        let reload = signal == Signal::Refresh;
        let settled = self
            .registry
            .fan_out(|r| async move { r.activate(signal, reload).await })
            .await;
        let verdicts: BTreeMap<String, Verdict> = match self.split(Mood::Activate, settled) {
            Ok(ok) => ok.into_iter().map(|(name, v)| (name.to_string(), v)).collect(),
            Err(rejected) => return rejected,
        };

        let kill = verdicts.values().any(|v| v.kill);
        let healthy = verdicts.values().all(|v| v.healthy);
        let failure = || PhaseFailure::Verdicts {
            phase: Mood::Activate.to_string(),
            verdicts: verdicts.clone(),
        };

        if kill {
            self.decide(Mood::Activate, Mood::Terminate, "kill requested")
                .with_error(failure())
        } else if !healthy {
            self.decide(Mood::Activate, Mood::Sick, "unhealthy")
                .with_error(failure())
        } else {
            self.decide(Mood::Activate, Mood::Healthy, "healthy")
        }
    }

    async fn healthy(&self, signal: Signal) -> Option<Forward<Mood>> {
        let settled = self
            .registry
            .fan_out(|r| async move { r.healthy(signal).await })
            .await;
        self.split(Mood::Healthy, settled).err()
    }

    async fn sick(&self) -> Option<Forward<Mood>> {
        let settled = self
            .registry
            .fan_out(|r| async move {
                let decision = r.sick().await?;
                Ok::<_, HookError>((decision, r.value_debug()))
            })
            .await;
        let decisions = match self.split(Mood::Sick, settled) {
            Ok(ok) => ok,
            Err(rejected) => return Some(rejected),
        };

        let killers: Vec<(String, String)> = decisions
            .into_iter()
            .filter(|(_, (decision, _))| decision.kill)
            .map(|(name, (_, value))| (name.to_string(), value))
            .collect();

        if killers.is_empty() {
            return None;
        }
        Some(
            self.decide(Mood::Sick, Mood::Terminate, "kill requested")
                .with_error(PhaseFailure::Killers { killers }),
        )
    }

    fn terminate(&self, signal: Signal) {
        self.bus
            .publish(Event::new(EventKind::Terminating).with_signal(signal));
        self.terminator.terminate(signal);
    }

    /// Fulfilled values when nothing rejected; otherwise the forward to `terminate`.
    fn split<T>(
        &self,
        phase: Mood,
        settled: Settled<T>,
    ) -> Result<Vec<(Arc<str>, T)>, Forward<Mood>> {
        let mut ok = Vec::with_capacity(settled.len());
        let mut reasons: BTreeMap<String, HookError> = BTreeMap::new();
        for (name, res) in settled {
            match res {
                Ok(v) => ok.push((name, v)),
                Err(e) => {
                    reasons.insert(name.to_string(), e);
                }
            }
        }
        if reasons.is_empty() {
            return Ok(ok);
        }

        let resources = reasons.keys().map(String::as_str).collect::<Vec<_>>().join(",");
        let failure = PhaseFailure::Rejected {
            phase: phase.to_string(),
            reasons,
        };
        self.bus.publish(
            Event::new(EventKind::PhaseRejected)
                .with_state(phase.as_str())
                .with_resource(resources)
                .with_reason(failure.to_string()),
        );
        Err(Forward::to(Mood::Terminate).with_error(failure))
    }

    fn decide(&self, phase: Mood, next: Mood, why: &str) -> Forward<Mood> {
        self.bus.publish(
            Event::new(EventKind::PhaseVerdict)
                .with_state(phase.as_str())
                .with_reason(format!("{why} -> {next}")),
        );
        Forward::to(next)
    }
}

#[async_trait]
impl StateHandler<Mood> for Phase {
    async fn activate(&self, transition: Transition<Mood>) -> HandlerResult<Mood> {
        let p = &self.phases;
        let signal = transition.signal;
        let next = match self.mood {
            Mood::Initialize => Some(p.initialize(signal).await),
            Mood::Check => Some(p.check(signal).await),
            Mood::Activate => Some(p.activate(signal).await),
            Mood::Healthy => p.healthy(signal).await,
            Mood::Sick => p.sick().await,
            Mood::Terminate => {
                p.terminate(signal);
                None
            }
        };
        Ok(next)
    }
}
