//! # vigil
//!
//! **Vigil** supervises the lifecycle of a process through the resources it depends on.
//!
//! Every dependency (database, cache, config file, queue...) is registered as a named
//! [`Resource`] with optional async hooks. The [`Orchestrator`] drives all of them through
//! a readiness pipeline and then arbitrates liveness: it moves the process between
//! `healthy` and `sick`, and hands it to a [`Terminator`] when a phase rejects or a
//! resource asks to die. The pipeline is a generic, signal-driven [`StateMachine`] that
//! can be used on its own.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Resource    │   │  Resource    │   │  Resource    │
//!     │  "db"        │   │  "cache"     │   │  "config"    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - Registry (named entries, staged values, sealed on wake_up)     │
//! │  - Phases (one StateHandler per Mood, settle-all fan-out)         │
//! │  - StateMachine<Mood> (transition table, forwarding cascades)     │
//! │  - Terminator (exit code from the terminating signal)             │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ publishes                                        │
//!        │ - SignalReceived / SignalIgnored / SignalProcessed│
//!        │ - TransitionAttempt / StateEntered / ...         │
//!        │ - PhaseVerdict / PhaseRejected / HookFailed      │
//!        ▼                                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                    (capacity: Config::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! wake_up() ─► initialize ─► check ─► activate ─┬─► healthy
//!                  │           │          │     └─► sick
//!                  └───────────┴──────────┴─► terminate ─► Terminator
//!
//! healthcheck() ─► on_healthcheck × N ─► health | sick
//! refresh()     ─► on_refresh × N     ─► initialize ─► ... (reload = true)
//! stop()        ─► on_stop × N        ─► terminate (exit code 0)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                        |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Orchestration** | Readiness pipeline and liveness arbitration over resources.   | [`Orchestrator`], [`Resource`], [`Mood`]  |
//! | **State machine** | Table-driven FSM with forwarding cascades and one-shot waits. | [`StateMachine`], [`TransitionTable`]     |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom sinks).    | [`Subscribe`]                             |
//! | **Errors**        | Typed errors for the machine, the orchestrator and hooks.     | [`MachineError`], [`OrchestratorError`]   |
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`]                                |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber, which maps events
//!   onto `tracing` records.
//!
//! ## Example
//! ```rust
//! use vigil::{Config, HookError, Mood, Orchestrator, Resource, Signal, TerminateFn, Verdict};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::builder(Config::default())
//!         .with_terminator(TerminateFn::arc(|signal: Signal| {
//!             eprintln!("terminating after {signal}");
//!         }))
//!         .build()?;
//!
//!     orch.resource(
//!         "db",
//!         Resource::new(String::new())
//!             .need(|_ctx| async { Ok::<_, HookError>("postgres://localhost".to_string()) })
//!             .check(|ctx| async move { Ok::<_, HookError>(!ctx.value.is_empty()) })
//!             .activate(|_ctx, _reload| async { Ok::<_, HookError>(Verdict::default()) }),
//!     )?;
//!
//!     orch.wake_up().await?;
//!     assert_eq!(orch.mood(), Some(Mood::Healthy));
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod events;
mod machine;
mod orchestrator;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{BoxError, HookError, MachineError, OrchestratorError, PhaseFailure};
pub use events::{Bus, Event, EventKind};
pub use machine::{
    Forward, HandlerFn, HandlerRef, HandlerResult, Listener, Notice, Signal, State, StateHandler,
    StateMachine, StateMachineBuilder, Transition, TransitionRule, TransitionTable,
    TransitionTableBuilder, Trigger,
};
pub use orchestrator::{
    Ctx, HealedReply, Health, HealthReport, Hook, KillDecision, Mood, Orchestrator,
    OrchestratorBuilder, Probe, ProcessExit, RefreshReply, Resource, SickHook, TerminateFn,
    Terminator, Value, Verdict, exit_code,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the built-in tracing subscriber.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
