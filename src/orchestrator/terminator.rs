//! # Terminators: what happens when the machine enters `terminate`.
//!
//! [`ProcessExit`] ends the process; tests and embedders plug in their own
//! [`Terminator`] (a closure wrapped in [`TerminateFn`] is enough).
//!
//! ## Exit codes
//! - `stop` → `0` (clean shutdown)
//! - anything else → `1`

use crate::machine::Signal;

/// Invoked once the machine enters the terminal state.
///
/// Runs inside the signal cascade, so it must not block; schedule heavy work instead.
pub trait Terminator: Send + Sync + 'static {
    /// `signal` is the signal whose cascade reached `terminate`.
    fn terminate(&self, signal: Signal);
}

/// Exit code for a termination caused by `signal`.
pub const fn exit_code(signal: Signal) -> i32 {
    match signal {
        Signal::Stop => 0,
        _ => 1,
    }
}

/// Ends the process with [`exit_code`].
///
/// The exit is deferred to a freshly spawned task so the cascade that reached
/// `terminate` finishes first. Outside a tokio runtime it exits immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, signal: Signal) {
        let code = exit_code(signal);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::task::yield_now().await;
                    std::process::exit(code);
                });
            }
            Err(_) => std::process::exit(code),
        }
    }
}

/// Closure adapter for [`Terminator`].
///
/// ```rust
/// use std::sync::Arc;
/// use vigil::{Signal, TerminateFn, Terminator};
///
/// let t: Arc<dyn Terminator> = TerminateFn::arc(|signal: Signal| {
///     eprintln!("terminating on {signal}");
/// });
/// # let _ = t;
/// ```
pub struct TerminateFn<F> {
    f: F,
}

impl<F> TerminateFn<F>
where
    F: Fn(Signal) + Send + Sync + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps `f` and returns it behind an `Arc`.
    pub fn arc(f: F) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new(f))
    }
}

impl<F> Terminator for TerminateFn<F>
where
    F: Fn(Signal) + Send + Sync + 'static,
{
    fn terminate(&self, signal: Signal) {
        (self.f)(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_only_stop_exits_cleanly() {
        assert_eq!(exit_code(Signal::Stop), 0);
        for signal in [Signal::Wakeup, Signal::Refresh, Signal::Health, Signal::Sick] {
            assert_eq!(exit_code(signal), 1, "{signal}");
        }
    }

    #[test]
    fn test_closure_terminator_sees_signal() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let t = TerminateFn::new(move |signal: Signal| sink.lock().unwrap().push(signal));

        t.terminate(Signal::Sick);
        assert_eq!(*seen.lock().unwrap(), [Signal::Sick]);
    }
}
