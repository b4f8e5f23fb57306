//! # Resource descriptors.
//!
//! A [`Resource`] bundles a value with optional lifecycle hooks. Hooks are async
//! closures returning `Result<_, HookError>`; an `Err` (or a panic) is a rejection.
//! Synchronous logic fits the same shape with `async move { .. }` or
//! [`std::future::ready`].
//!
//! | hook             | receives             | returns          | when absent                |
//! |------------------|----------------------|------------------|----------------------------|
//! | `need`           | [`Ctx`]              | new value        | value kept                 |
//! | `check`          | [`Ctx`]              | `bool`           | `true`                     |
//! | `activate`       | [`Ctx`], `reload`    | [`Verdict`]      | `Verdict::default()`       |
//! | `healthy`        | [`Ctx`]              | [`Verdict`]      | not called                 |
//! | `sick`           | [`Probe`]            | [`KillDecision`] | no kill                    |
//! | `on_healthcheck` | [`Probe`], [`Health`]| [`Health`]       | healthy                    |
//! | `on_stop`        | [`Probe`]            | `bool`           | not called                 |
//! | `on_refresh`     | [`Ctx`]              | [`RefreshReply`] | not called                 |
//! | `on_healed`      | [`Probe`], [`Health`]| [`HealedReply`]  | not called                 |
//!
//! ## Example
//! ```rust
//! use vigil::{HookError, Resource, Verdict};
//!
//! let pool = Resource::new(0_usize)
//!     .need(|ctx| async move { Ok::<_, HookError>(ctx.value + 8) })
//!     .check(|ctx| async move { Ok::<_, HookError>(ctx.value > 0) })
//!     .activate(|_ctx, _reload| async { Ok::<_, HookError>(Verdict::default()) });
//! # let _ = pool;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::HookError;
use crate::machine::Signal;

use super::report::Health;

/// Type-erased async hook.
pub type Hook<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, HookError>> + Send + Sync>;

/// Bound on resource values.
pub trait Value: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + fmt::Debug + Send + Sync + 'static {}

/// Context of the phase hooks that see the signal.
#[derive(Debug, Clone)]
pub struct Ctx<V> {
    /// Registered resource name.
    pub name: Arc<str>,
    /// Current value (a clone).
    pub value: V,
    /// Signal that drove the machine into this phase.
    pub signal: Signal,
}

/// Context of the hooks that run outside a signal (`sick`, `on_*`).
#[derive(Debug, Clone)]
pub struct Probe<V> {
    /// Registered resource name.
    pub name: Arc<str>,
    /// Current value (a clone).
    pub value: V,
}

/// Reply of `activate` and `healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Ask the process to terminate.
    pub kill: bool,
    /// Whether the resource considers itself healthy.
    pub healthy: bool,
}

impl Verdict {
    /// `{ kill: false, healthy: false }`.
    pub const fn unhealthy() -> Self {
        Self {
            kill: false,
            healthy: false,
        }
    }

    /// `{ kill: true, healthy: false }`.
    pub const fn kill() -> Self {
        Self {
            kill: true,
            healthy: false,
        }
    }
}

impl Default for Verdict {
    /// `{ kill: false, healthy: true }`.
    fn default() -> Self {
        Self {
            kill: false,
            healthy: true,
        }
    }
}

/// Reply of `sick`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KillDecision {
    /// Ask the process to terminate.
    pub kill: bool,
}

/// Reply of `on_healed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealedReply {
    /// The resource confirms recovery.
    pub healed: bool,
    /// The resource would rather terminate.
    pub kill: bool,
}

/// Reply of `on_refresh`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReply {
    /// The resource accepted the refresh.
    pub acknowledged: bool,
}

/// The `sick` hook: a closure, or a static flag.
///
/// A flag is never evaluated: the resource does not take part in the kill decision,
/// whatever the flag says.
pub enum SickHook<V> {
    /// Decides on every `sick` phase.
    Decide(Hook<Probe<V>, KillDecision>),
    /// Static flag.
    Flag(bool),
}

pub(crate) struct Hooks<V> {
    pub(crate) need: Option<Hook<Ctx<V>, V>>,
    pub(crate) check: Option<Hook<Ctx<V>, bool>>,
    pub(crate) activate: Option<Hook<(Ctx<V>, bool), Verdict>>,
    pub(crate) healthy: Option<Hook<Ctx<V>, Verdict>>,
    pub(crate) sick: Option<SickHook<V>>,
    pub(crate) healthcheck: Option<Hook<(Probe<V>, Health), Health>>,
    pub(crate) stop: Option<Hook<Probe<V>, bool>>,
    pub(crate) refresh: Option<Hook<Ctx<V>, RefreshReply>>,
    pub(crate) healed: Option<Hook<(Probe<V>, Health), HealedReply>>,
}

impl<V> Default for Hooks<V> {
    fn default() -> Self {
        Self {
            need: None,
            check: None,
            activate: None,
            healthy: None,
            sick: None,
            healthcheck: None,
            stop: None,
            refresh: None,
            healed: None,
        }
    }
}

/// A value under supervision plus its lifecycle hooks.
pub struct Resource<V> {
    pub(crate) value: V,
    pub(crate) hooks: Hooks<V>,
}

impl<V: Value + Default> Default for Resource<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V: Value> Resource<V> {
    /// A resource holding `value` with no hooks.
    pub fn new(value: V) -> Self {
        Self {
            value,
            hooks: Hooks::default(),
        }
    }

    /// Acquires the value during `initialize`. The returned value replaces the current
    /// one once every resource's `need` succeeded.
    pub fn need<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Ctx<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, HookError>> + Send + 'static,
    {
        self.hooks.need = Some(Arc::new(move |ctx: Ctx<V>| f(ctx).boxed()));
        self
    }

    /// Validates the value during `check`.
    pub fn check<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Ctx<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HookError>> + Send + 'static,
    {
        self.hooks.check = Some(Arc::new(move |ctx: Ctx<V>| f(ctx).boxed()));
        self
    }

    /// Starts the resource during `activate`. `reload` is true when the pipeline runs
    /// again because of a refresh.
    pub fn activate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Ctx<V>, bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Verdict, HookError>> + Send + 'static,
    {
        self.hooks.activate = Some(Arc::new(move |(ctx, reload): (Ctx<V>, bool)| {
            f(ctx, reload).boxed()
        }));
        self
    }

    /// Runs on every entry into `healthy`; only a rejection matters.
    pub fn healthy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Ctx<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Verdict, HookError>> + Send + 'static,
    {
        self.hooks.healthy = Some(Arc::new(move |ctx: Ctx<V>| f(ctx).boxed()));
        self
    }

    /// Decides, on every entry into `sick`, whether the process should die.
    pub fn sick<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Probe<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<KillDecision, HookError>> + Send + 'static,
    {
        self.hooks.sick = Some(SickHook::Decide(Arc::new(move |probe: Probe<V>| f(probe).boxed())));
        self
    }

    /// Static `sick` flag. See [`SickHook::Flag`].
    pub fn sick_flag(mut self, flag: bool) -> Self {
        self.hooks.sick = Some(SickHook::Flag(flag));
        self
    }

    /// Reports health during `healthcheck()`. The second argument is the default
    /// (healthy) report.
    pub fn on_healthcheck<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Probe<V>, Health) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Health, HookError>> + Send + 'static,
    {
        self.hooks.healthcheck = Some(Arc::new(move |(probe, health): (Probe<V>, Health)| {
            f(probe, health).boxed()
        }));
        self
    }

    /// Runs before the `stop` signal. Failures are logged and ignored.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Probe<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HookError>> + Send + 'static,
    {
        self.hooks.stop = Some(Arc::new(move |probe: Probe<V>| f(probe).boxed()));
        self
    }

    /// Runs before the `refresh` signal. Failures are logged and ignored.
    pub fn on_refresh<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Ctx<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RefreshReply, HookError>> + Send + 'static,
    {
        self.hooks.refresh = Some(Arc::new(move |ctx: Ctx<V>| f(ctx).boxed()));
        self
    }

    /// Runs after a healthcheck moved the machine from `sick` back to `healthy`.
    pub fn on_healed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Probe<V>, Health) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HealedReply, HookError>> + Send + 'static,
    {
        self.hooks.healed = Some(Arc::new(move |(probe, health): (Probe<V>, Health)| {
            f(probe, health).boxed()
        }));
        self
    }
}

impl<V: fmt::Debug> fmt::Debug for Resource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.hooks;
        f.debug_struct("Resource")
            .field("value", &self.value)
            .field("need", &h.need.is_some())
            .field("check", &h.check.is_some())
            .field("activate", &h.activate.is_some())
            .field("healthy", &h.healthy.is_some())
            .field("sick", &h.sick.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_default_is_healthy_without_kill() {
        assert_eq!(
            Verdict::default(),
            Verdict {
                kill: false,
                healthy: true
            }
        );
    }

    #[tokio::test]
    async fn test_builder_stores_callable_hooks() {
        let res = Resource::new(1_u32)
            .need(|ctx| async move { Ok::<_, HookError>(ctx.value * 10) })
            .activate(|_ctx, reload| async move {
                Ok::<_, HookError>(Verdict {
                    kill: reload,
                    healthy: true,
                })
            });

        let need = res.hooks.need.as_ref().expect("need set");
        let ctx = Ctx {
            name: Arc::from("db"),
            value: res.value,
            signal: Signal::Wakeup,
        };
        assert_eq!(need(ctx.clone()).await, Ok(10));

        let activate = res.hooks.activate.as_ref().expect("activate set");
        assert!(activate((ctx, true)).await.expect("verdict").kill);
        assert!(res.hooks.check.is_none());
    }

    #[test]
    fn test_sick_flag_replaces_closure() {
        let res = Resource::new(())
            .sick(|_p| async { Ok::<_, HookError>(KillDecision { kill: true }) })
            .sick_flag(true);
        assert!(matches!(res.hooks.sick, Some(SickHook::Flag(true))));
    }
}
