//! # Orchestrator: resource registry plus the lifecycle machine.
//!
//! ## Architecture
//! ```text
//! resource(name, Resource<V>) ──► Registry (sealed by wake_up)
//!
//! wake_up()      ──► spawn(machine.signal(wakeup))      ─┐
//! healthcheck()  ──► spawn(probe)                        ├─ raced against the timeout;
//!                      ├─ await healthy | sick           │  the spawned work keeps
//!                      ├─ on_healthcheck × N (settle all)│  running when it elapses
//!                      ├─ signal(health | sick)          │
//!                      └─ sick → healthy? on_healed × N ─┘
//! refresh()      ──► on_refresh × N ──► signal(refresh)
//! stop()         ──► on_stop × N    ──► signal(stop) ──► terminate ──► Terminator
//!
//! machine / phases ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Example
//! ```rust
//! use vigil::{Config, HookError, Mood, Orchestrator, Resource, Signal, TerminateFn};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), vigil::OrchestratorError> {
//! let orch = Orchestrator::builder(Config::default())
//!     .with_terminator(TerminateFn::arc(|_signal: Signal| {}))
//!     .build()?;
//!
//! orch.resource(
//!     "db",
//!     Resource::new(0_u32).need(|_ctx| async { Ok::<_, HookError>(5) }),
//! )?;
//!
//! orch.wake_up().await?;
//! assert_eq!(orch.mood(), Some(Mood::Healthy));
//!
//! let report = orch.healthcheck().await?;
//! assert!(report.healthy);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{HookError, OrchestratorError},
    events::{Bus, Event, EventKind},
    machine::{Signal, StateMachine},
};

use super::{
    builder::OrchestratorBuilder,
    mood::Mood,
    registry::{Registry, Settled},
    report::{Health, HealthReport},
    resource::{RefreshReply, Resource, Value},
    shutdown,
};

/// Drives registered resources through the lifecycle.
///
/// Cheap to clone; clones share the same registry and machine.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    machine: Arc<StateMachine<Mood>>,
    awake: AtomicBool,
}

impl Orchestrator {
    /// Starts a builder.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        registry: Arc<Registry>,
        machine: Arc<StateMachine<Mood>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                registry,
                machine,
                awake: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a resource under `name`.
    ///
    /// Fails with `DuplicateResource` when the name is taken (the first registration is
    /// kept), and with `RegistrationClosed` once `wake_up()` was called.
    pub fn resource<V: Value>(
        &self,
        name: impl Into<String>,
        resource: Resource<V>,
    ) -> Result<&Self, OrchestratorError> {
        self.inner.registry.insert(name.into(), resource)?;
        Ok(self)
    }

    /// Registered resource names, in registration order.
    pub fn resources(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Current mood; `None` before the first transition.
    pub fn mood(&self) -> Option<Mood> {
        self.inner.machine.state()
    }

    /// The underlying machine, for listeners and `await_state`.
    pub fn machine(&self) -> &StateMachine<Mood> {
        &self.inner.machine
    }

    /// The event bus.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// The configuration the orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    /// Runs the readiness pipeline with the configured default timeout.
    pub async fn wake_up(&self) -> Result<(), OrchestratorError> {
        self.wake_up_with(self.inner.cfg.wakeup_timeout()).await
    }

    /// Runs the readiness pipeline (`initialize → check → activate → healthy | sick`).
    ///
    /// Closes registration. Only the first call on a machine that is still
    /// uninitialized sends `wakeup`; otherwise this returns `Ok(())` at once. When
    /// `timeout` elapses the caller gets `Timeout` while the pipeline keeps running.
    pub async fn wake_up_with(&self, timeout: Option<Duration>) -> Result<(), OrchestratorError> {
        let repeated = self.inner.awake.swap(true, Ordering::AcqRel);
        self.inner.registry.seal();
        if repeated || self.mood().is_some() {
            return Ok(());
        }

        let machine = Arc::clone(&self.inner.machine);
        let task = tokio::spawn(async move {
            machine
                .signal(Signal::Wakeup)
                .await
                .map_err(OrchestratorError::from)
        });
        self.race("wake_up", timeout, task).await
    }

    /// Probes every resource with the configured default timeout.
    pub async fn healthcheck(&self) -> Result<HealthReport, OrchestratorError> {
        self.healthcheck_with(self.inner.cfg.healthcheck_timeout()).await
    }

    /// Probes every resource and reconciles the mood with the result.
    ///
    /// Waits until the machine is `healthy` or `sick` (a probe before `wake_up()` waits
    /// for the pipeline), runs every `on_healthcheck` hook concurrently, then signals
    /// `health` or `sick`. A failing hook counts as healthy and is reported in
    /// `errors`. When `timeout` elapses the caller gets `Timeout` while the probe
    /// keeps running.
    pub async fn healthcheck_with(
        &self,
        timeout: Option<Duration>,
    ) -> Result<HealthReport, OrchestratorError> {
        let me = self.clone();
        let task = tokio::spawn(async move { me.probe().await });
        self.race("healthcheck", timeout, task).await
    }

    /// Runs every `on_refresh` hook, then sends `refresh`, re-running the pipeline from
    /// `initialize` with `reload = true` in `activate`.
    ///
    /// Returns the replies of the hooks that answered; failures are logged.
    pub async fn refresh(&self) -> Result<BTreeMap<String, RefreshReply>, OrchestratorError> {
        let settled = self
            .inner
            .registry
            .fan_out(|r| async move { r.refresh(Signal::Refresh).await })
            .await;
        let replies = self
            .best_effort(settled)
            .into_iter()
            .filter_map(|(name, reply)| reply.map(|r| (name, r)))
            .collect();

        self.inner.machine.signal(Signal::Refresh).await?;
        Ok(replies)
    }

    /// Runs every `on_stop` hook, then sends `stop`; the terminator sees `Signal::Stop`.
    pub async fn stop(&self) -> Result<(), OrchestratorError> {
        let settled = self
            .inner
            .registry
            .fan_out(|r| async move { r.stop().await })
            .await;
        self.best_effort(settled);

        self.inner.machine.signal(Signal::Stop).await?;
        Ok(())
    }

    /// Waits for an OS termination signal (or `token`), then [`stop`](Self::stop)s.
    pub async fn stop_on_shutdown(
        &self,
        token: CancellationToken,
    ) -> Result<(), OrchestratorError> {
        shutdown::wait_for_shutdown(&token)
            .await
            .map_err(|e| OrchestratorError::Aborted {
                operation: "stop_on_shutdown",
                reason: e.to_string(),
            })?;
        self.inner
            .bus
            .publish(Event::new(EventKind::ShutdownRequested));
        self.stop().await
    }

    async fn probe(&self) -> Result<HealthReport, OrchestratorError> {
        let machine = &self.inner.machine;
        let healthy = machine.await_state(Mood::Healthy);
        let sick = machine.await_state(Mood::Sick);
        tokio::select! {
            _ = healthy => {},
            _ = sick => {},
        }

        let settled = self
            .inner
            .registry
            .fan_out(|r| async move { r.healthcheck().await })
            .await;
        let mut report = HealthReport::new();
        for (name, res) in settled {
            match res {
                Ok(health) => report.record(&name, health.unwrap_or_default(), None),
                Err(e) => {
                    self.hook_failed(&name, &e);
                    report.record(&name, Health::default(), Some(e.to_string()));
                }
            }
        }

        let before = machine.state();
        let signal = if report.healthy {
            Signal::Health
        } else {
            Signal::Sick
        };
        machine.signal(signal).await?;
        self.inner.bus.publish(
            Event::new(EventKind::HealthcheckCompleted)
                .with_signal(signal)
                .with_reason(if report.healthy { "healthy" } else { "unhealthy" }),
        );

        if before == Some(Mood::Sick) && machine.state() == Some(Mood::Healthy) {
            self.healed(&report).await;
        }
        Ok(report)
    }

    /// Tells every resource it recovered; replies are logged only.
    async fn healed(&self, report: &HealthReport) {
        let entries = self.inner.registry.snapshot();
        let calls = entries.into_iter().map(|r| {
            let health = report
                .resources
                .get(&**r.name())
                .cloned()
                .unwrap_or_default();
            async move { (Arc::clone(r.name()), r.healed(health).await) }
        });
        let settled: Settled<_> = join_all(calls).await;

        for (name, reply) in self.best_effort(settled) {
            if let Some(reply) = reply {
                self.inner.bus.publish(
                    Event::new(EventKind::PhaseVerdict)
                        .with_state("healed")
                        .with_resource(name)
                        .with_reason(format!("healed={} kill={}", reply.healed, reply.kill)),
                );
            }
        }
    }

    /// Keeps fulfilled results, logs the rest.
    fn best_effort<T>(&self, settled: Settled<T>) -> Vec<(String, T)> {
        let mut ok = Vec::with_capacity(settled.len());
        for (name, res) in settled {
            match res {
                Ok(v) => ok.push((name.to_string(), v)),
                Err(e) => self.hook_failed(&name, &e),
            }
        }
        ok
    }

    fn hook_failed(&self, name: &str, err: &HookError) {
        self.inner.bus.publish(
            Event::new(EventKind::HookFailed)
                .with_resource(name)
                .with_reason(err.to_string()),
        );
    }

    /// Awaits `task`, giving up after `timeout` without cancelling it.
    async fn race<T>(
        &self,
        operation: &'static str,
        timeout: Option<Duration>,
        task: JoinHandle<Result<T, OrchestratorError>>,
    ) -> Result<T, OrchestratorError> {
        let joined = match timeout {
            None => task.await,
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    self.inner.bus.publish(
                        Event::new(EventKind::TimeoutHit)
                            .with_reason(operation)
                            .with_timeout(limit),
                    );
                    return Err(OrchestratorError::Timeout {
                        operation,
                        timeout: limit,
                    });
                }
            },
        };
        joined.map_err(|e| OrchestratorError::Aborted {
            operation,
            reason: e.to_string(),
        })?
    }
}
