//! # Generic signal-driven finite state machine.
//!
//! The machine holds the current state (or `None` before the first transition), a
//! [`TransitionTable`] keyed by [`Signal`], one async [`StateHandler`] per state and a
//! registry of synchronous listeners.
//!
//! ## Transition protocol
//! ```text
//! signal(sig)
//!   └─► rule = table.lookup(sig, current)          (none → ignored, Ok)
//!         ├─► try_change_state(current, rule.success)
//!         │     ├─ is_allowed(sig, current, to)?    (no → IllegalTransition)
//!         │     ├─ handler(to).activate(..).await  (Err → Handler error, state kept)
//!         │     ├─ error annotation? → logged, transition proceeds
//!         │     ├─ commit: state = to, wake waiters, notify listeners
//!         │     └─ forward? → try_change_state(to, forward.to)   (same signal)
//!         └─ Err ─► try_change_state(state now, rule.failure)   (result returned)
//! ```
//!
//! Only the outermost attempt of a signal falls back to the failure target; errors
//! raised deeper in a forwarding cascade propagate up to that single fallback.
//!
//! Signals are processed one at a time: a second `signal()` call waits until the
//! cascade of the first one has settled.

mod handler;
mod listeners;
mod signal;
mod state_machine;
mod table;

pub use handler::{Forward, HandlerFn, HandlerRef, HandlerResult, StateHandler, Transition};
pub use listeners::{Listener, Notice, Trigger};
pub use signal::{Signal, State};
pub use state_machine::{StateMachine, StateMachineBuilder};
pub use table::{TransitionRule, TransitionTable, TransitionTableBuilder};
