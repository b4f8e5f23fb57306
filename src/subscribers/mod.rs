//! # Event subscribers for the orchestrator runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! built-in implementations for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   StateMachine / phases ── publish(Event) ──► Bus ──► bus listener ──► SubscriberSet
//!                                                                          │
//!                                                                ┌─────────┼─────────┐
//!                                                                ▼         ▼         ▼
//!                                                            LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use vigil::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Pager;
//!
//! #[async_trait]
//! impl Subscribe for Pager {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::Terminating {
//!             // page the on-call
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "pager"
//!     }
//! }
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod embedded;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
