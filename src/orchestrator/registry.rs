//! # Resource registry.
//!
//! Erases each [`Resource<V>`]'s value type behind [`Supervised`], so phases can fan
//! out over heterogeneous resources.
//!
//! ## Rules
//! - Names are unique; a duplicate registration fails and leaves the first one intact.
//! - The registry is sealed when the pipeline starts; later registrations fail.
//! - A resource's value changes only through [`Supervised::commit`], after every
//!   `need` of the same `initialize` phase fulfilled.
//! - Every hook call is panic-isolated: a panic becomes [`HookError::Panicked`].

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;

use crate::error::{HookError, OrchestratorError};
use crate::machine::Signal;

use super::report::Health;
use super::resource::{
    Ctx, HealedReply, Hook, Hooks, KillDecision, Probe, RefreshReply, Resource, SickHook, Value,
    Verdict,
};

/// A registered resource with its value type erased.
#[async_trait]
pub(crate) trait Supervised: Send + Sync + 'static {
    fn name(&self) -> &Arc<str>;

    /// `Debug` rendering of the current value.
    fn value_debug(&self) -> String;

    /// Runs `need` and stages the new value.
    async fn need(&self, signal: Signal) -> Result<(), HookError>;

    /// Installs the staged value, if any.
    fn commit(&self);

    /// Drops the staged value, if any.
    fn discard(&self);

    async fn check(&self, signal: Signal) -> Result<bool, HookError>;

    async fn activate(&self, signal: Signal, reload: bool) -> Result<Verdict, HookError>;

    /// `None` when the resource has no `healthy` hook.
    async fn healthy(&self, signal: Signal) -> Result<Option<Verdict>, HookError>;

    async fn sick(&self) -> Result<KillDecision, HookError>;

    /// `None` when the resource has no `on_healthcheck` hook.
    async fn healthcheck(&self) -> Result<Option<Health>, HookError>;

    async fn stop(&self) -> Result<Option<bool>, HookError>;

    async fn refresh(&self, signal: Signal) -> Result<Option<RefreshReply>, HookError>;

    async fn healed(&self, health: Health) -> Result<Option<HealedReply>, HookError>;
}

struct Entry<V> {
    name: Arc<str>,
    value: RwLock<V>,
    staged: Mutex<Option<V>>,
    hooks: Hooks<V>,
}

impl<V: Value> Entry<V> {
    fn value(&self) -> V {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ctx(&self, signal: Signal) -> Ctx<V> {
        Ctx {
            name: Arc::clone(&self.name),
            value: self.value(),
            signal,
        }
    }

    fn probe(&self) -> Probe<V> {
        Probe {
            name: Arc::clone(&self.name),
            value: self.value(),
        }
    }

    fn staged(&self) -> std::sync::MutexGuard<'_, Option<V>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Calls a hook, turning a panic (while building or polling its future) into a rejection.
async fn call<A, T>(hook: &Hook<A, T>, arg: A) -> Result<T, HookError> {
    let fut = match catch_unwind(AssertUnwindSafe(|| hook(arg))) {
        Ok(fut) => fut,
        Err(panic) => return Err(HookError::from_panic(panic)),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(HookError::from_panic(panic)),
    }
}

async fn call_opt<A, T>(
    hook: Option<&Hook<A, T>>,
    arg: impl FnOnce() -> A,
) -> Result<Option<T>, HookError> {
    match hook {
        Some(hook) => call(hook, arg()).await.map(Some),
        None => Ok(None),
    }
}

#[async_trait]
impl<V: Value> Supervised for Entry<V> {
    fn name(&self) -> &Arc<str> {
        &self.name
    }

    fn value_debug(&self) -> String {
        format!("{:?}", self.value())
    }

    async fn need(&self, signal: Signal) -> Result<(), HookError> {
        if let Some(value) = call_opt(self.hooks.need.as_ref(), || self.ctx(signal)).await? {
            *self.staged() = Some(value);
        }
        Ok(())
    }

    fn commit(&self) {
        if let Some(value) = self.staged().take() {
            *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        }
    }

    fn discard(&self) {
        self.staged().take();
    }

    async fn check(&self, signal: Signal) -> Result<bool, HookError> {
        Ok(call_opt(self.hooks.check.as_ref(), || self.ctx(signal))
            .await?
            .unwrap_or(true))
    }

    async fn activate(&self, signal: Signal, reload: bool) -> Result<Verdict, HookError> {
        Ok(call_opt(self.hooks.activate.as_ref(), || (self.ctx(signal), reload))
            .await?
            .unwrap_or_default())
    }

    async fn healthy(&self, signal: Signal) -> Result<Option<Verdict>, HookError> {
        call_opt(self.hooks.healthy.as_ref(), || self.ctx(signal)).await
    }

    async fn sick(&self) -> Result<KillDecision, HookError> {
        match &self.hooks.sick {
            Some(SickHook::Decide(hook)) => call(hook, self.probe()).await,
            Some(SickHook::Flag(_)) | None => Ok(KillDecision::default()),
        }
    }

    async fn healthcheck(&self) -> Result<Option<Health>, HookError> {
        call_opt(self.hooks.healthcheck.as_ref(), || (self.probe(), Health::default())).await
    }

    async fn stop(&self) -> Result<Option<bool>, HookError> {
        call_opt(self.hooks.stop.as_ref(), || self.probe()).await
    }

    async fn refresh(&self, signal: Signal) -> Result<Option<RefreshReply>, HookError> {
        call_opt(self.hooks.refresh.as_ref(), || self.ctx(signal)).await
    }

    async fn healed(&self, health: Health) -> Result<Option<HealedReply>, HookError> {
        call_opt(self.hooks.healed.as_ref(), || (self.probe(), health)).await
    }
}

/// Per-resource outcome of one fan-out.
pub(crate) type Settled<T> = Vec<(Arc<str>, Result<T, HookError>)>;

/// Registered resources, in registration order.
pub(crate) struct Registry {
    entries: RwLock<Vec<Arc<dyn Supervised>>>,
    sealed: AtomicBool,
}

impl Registry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(Vec::new()),
            sealed: AtomicBool::new(false),
        })
    }

    pub(crate) fn insert<V: Value>(
        &self,
        name: String,
        resource: Resource<V>,
    ) -> Result<(), OrchestratorError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if self.sealed.load(Ordering::Acquire) {
            return Err(OrchestratorError::RegistrationClosed { name });
        }
        if entries.iter().any(|e| **e.name() == *name) {
            return Err(OrchestratorError::DuplicateResource { name });
        }
        entries.push(Arc::new(Entry {
            name: Arc::from(name),
            value: RwLock::new(resource.value),
            staged: Mutex::new(None),
            hooks: resource.hooks,
        }));
        Ok(())
    }

    /// Closes registration.
    pub(crate) fn seal(&self) {
        let _entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.sealed.store(true, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Supervised>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Runs `f` for every resource concurrently and waits for all of them to settle.
    pub(crate) async fn fan_out<T, F, Fut>(&self, f: F) -> Settled<T>
    where
        F: Fn(Arc<dyn Supervised>) -> Fut,
        Fut: Future<Output = Result<T, HookError>>,
    {
        let entries = self.snapshot();
        let calls = entries.into_iter().map(|entry| {
            let name = Arc::clone(entry.name());
            let fut = f(entry);
            async move { (name, fut.await) }
        });
        join_all(calls).await
    }

    pub(crate) fn commit_all(&self) {
        for entry in self.snapshot() {
            entry.commit();
        }
    }

    pub(crate) fn discard_all(&self) {
        for entry in self.snapshot() {
            entry.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(start: u32) -> Resource<u32> {
        Resource::new(start).need(|ctx| async move { Ok::<_, HookError>(ctx.value + 1) })
    }

    #[test]
    fn test_duplicate_name_is_rejected_and_first_kept() {
        let reg = Registry::new();
        reg.insert("db".into(), counter(1)).expect("first");
        let err = reg.insert("db".into(), counter(7)).expect_err("duplicate");
        assert!(matches!(err, OrchestratorError::DuplicateResource { ref name } if name == "db"));
        assert_eq!(reg.names(), ["db"]);
        assert_eq!(reg.snapshot()[0].value_debug(), "1");
    }

    #[test]
    fn test_sealed_registry_rejects_new_resources() {
        let reg = Registry::new();
        reg.seal();
        let err = reg.insert("late".into(), counter(0)).expect_err("sealed");
        assert!(matches!(err, OrchestratorError::RegistrationClosed { .. }));
    }

    #[tokio::test]
    async fn test_need_stages_until_commit() {
        let reg = Registry::new();
        reg.insert("db".into(), counter(1)).expect("insert");

        let settled = reg.fan_out(|e| async move { e.need(Signal::Wakeup).await }).await;
        assert!(settled.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(reg.snapshot()[0].value_debug(), "1");

        reg.commit_all();
        assert_eq!(reg.snapshot()[0].value_debug(), "2");
    }

    #[tokio::test]
    async fn test_discard_drops_staged_value() {
        let reg = Registry::new();
        reg.insert("db".into(), counter(1)).expect("insert");
        let _ = reg.fan_out(|e| async move { e.need(Signal::Wakeup).await }).await;

        reg.discard_all();
        reg.commit_all();
        assert_eq!(reg.snapshot()[0].value_debug(), "1");
    }

    #[tokio::test]
    async fn test_panicking_hook_becomes_rejection() {
        let reg = Registry::new();
        reg.insert(
            "flaky".into(),
            Resource::new(()).check(|_ctx| async {
                if true {
                    panic!("probe exploded");
                }
                Ok::<_, HookError>(true)
            }),
        )
        .expect("insert");

        let settled = reg.fan_out(|e| async move { e.check(Signal::Wakeup).await }).await;
        assert_eq!(
            settled[0].1,
            Err(HookError::Panicked {
                info: "probe exploded".into()
            })
        );
    }

    #[tokio::test]
    async fn test_defaults_apply_without_hooks() {
        let reg = Registry::new();
        reg.insert("plain".into(), Resource::new(5_u8)).expect("insert");
        let entry = &reg.snapshot()[0];

        assert_eq!(entry.check(Signal::Wakeup).await, Ok(true));
        assert_eq!(entry.activate(Signal::Wakeup, false).await, Ok(Verdict::default()));
        assert_eq!(entry.healthy(Signal::Wakeup).await, Ok(None));
        assert_eq!(entry.sick().await, Ok(KillDecision { kill: false }));
        assert_eq!(entry.healthcheck().await, Ok(None));
    }

    #[tokio::test]
    async fn test_sick_flag_never_kills() {
        let reg = Registry::new();
        reg.insert("flagged".into(), Resource::new(()).sick_flag(true))
            .expect("insert");
        let entry = &reg.snapshot()[0];
        assert_eq!(entry.sick().await, Ok(KillDecision { kill: false }));
    }
}
