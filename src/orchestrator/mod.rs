//! # Lifecycle orchestration over registered resources.
//!
//! An [`Orchestrator`] owns a registry of named [`Resource`]s and a
//! [`StateMachine`](crate::StateMachine) over [`Mood`]. Each mood's activation handler
//! fans out to every resource, waits for all of them to settle and folds the results
//! into one decision:
//!
//! - **any rejection** in a phase stops the pipeline (`terminate`);
//! - **all must agree** for `check` and for the `healthy` part of `activate`;
//! - **any may kill** in `activate` and `sick`;
//! - **best effort** for `on_healthcheck`, `on_stop`, `on_refresh`, `on_healed`.
//!
//! ```text
//! (none) ─wakeup─► initialize ─► check ─► activate ─┬─► healthy ◄──health/sick──► sick
//!                      │           │          │     └─► sick
//!                      └───────────┴──────────┴──► terminate ◄──stop── healthy | sick
//! ```

mod builder;
mod mood;
mod phases;
mod registry;
mod report;
mod resource;
mod runtime;
mod shutdown;
mod terminator;


pub use builder::OrchestratorBuilder;
pub use mood::Mood;
pub use report::{Health, HealthReport};
pub use resource::{
    Ctx, HealedReply, Hook, KillDecision, Probe, RefreshReply, Resource, SickHook, Value, Verdict,
};
pub use runtime::Orchestrator;
pub use terminator::{ProcessExit, TerminateFn, Terminator, exit_code};
