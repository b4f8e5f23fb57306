//! # Activation handlers.
//!
//! Every state owns one [`StateHandler`]. The handler runs *before* the state is
//! committed; its return value decides whether the cascade continues:
//!
//! - `Ok(None)` → the machine rests in the new state
//! - `Ok(Some(Forward { to, error }))` → the state is entered, `error` (if any) is
//!   logged, then the machine immediately tries `to` under the same signal
//! - `Err(e)` → the state is **not** entered; the signal falls back to its failure target
//!
//! [`HandlerFn`] adapts a closure, in the same way a function-backed task would.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;

use super::signal::{Signal, State};

/// The step being taken: where the machine is, where it goes, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    /// State before the step (`None` before the first transition).
    pub from: Option<S>,
    /// Destination state.
    pub to: S,
    /// Signal that triggered the step (or the cascade containing it).
    pub signal: Signal,
}

/// Request to continue the cascade to another state.
#[derive(Debug)]
pub struct Forward<S> {
    /// Next state; must be reachable from the current one for the same signal.
    pub to: S,
    /// Annotation explaining the forward; logged, never blocks the transition.
    pub error: Option<BoxError>,
}

impl<S> Forward<S> {
    /// Forward without annotation.
    pub fn to(to: S) -> Self {
        Self { to, error: None }
    }

    /// Attaches an annotation.
    pub fn with_error(mut self, error: impl Into<BoxError>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Outcome of an activation handler.
pub type HandlerResult<S> = Result<Option<Forward<S>>, BoxError>;

/// Shared handle to a handler.
pub type HandlerRef<S> = Arc<dyn StateHandler<S>>;

/// Async activation logic of one state.
#[async_trait]
pub trait StateHandler<S: State>: Send + Sync + 'static {
    /// Runs when the machine is about to enter `transition.to`.
    async fn activate(&self, transition: Transition<S>) -> HandlerResult<S>;
}

/// Function-backed handler.
///
/// ## Example
/// ```rust
/// use vigil::{Forward, HandlerFn, HandlerRef, HandlerResult, Transition};
///
/// let handler: HandlerRef<&'static str> = HandlerFn::arc(|t: Transition<&'static str>| async move {
///     let next: HandlerResult<&'static str> = if t.to == "booting" {
///         Ok(Some(Forward::to("running")))
///     } else {
///         Ok(None)
///     };
///     next
/// });
/// # let _ = handler;
/// ```
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<S, F, Fut> StateHandler<S> for HandlerFn<F>
where
    S: State,
    F: Fn(Transition<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<S>> + Send + 'static,
{
    async fn activate(&self, transition: Transition<S>) -> HandlerResult<S> {
        (self.f)(transition).await
    }
}
