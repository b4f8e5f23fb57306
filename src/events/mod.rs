//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the state machine, the
//! orchestrator phases and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StateMachine` (signals, transitions, listener panics),
//!   orchestrator phases (rejections, verdicts), entry points (timeouts,
//!   probes, shutdown), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the orchestrator's bus listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
