//! Error types used by the state machine, the orchestrator and resource hooks.
//!
//! This module defines four error types:
//!
//! - [`MachineError`] — raised by the generic state machine (illegal transitions,
//!   failing activation handlers, runaway forwarding, invalid tables).
//! - [`OrchestratorError`] — raised at the public API of the orchestrator.
//! - [`HookError`] — the rejection reason a resource hook reports.
//! - [`PhaseFailure`] — aggregated per-resource outcome carried by a forwarding
//!   transition into `terminate` or `sick`.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::machine::Signal;
use crate::orchestrator::Verdict;

/// Boxed error used at the generic seams of the state machine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the state machine.
///
/// An illegal transition is always a programming error: either the transition table
/// is wrong, or an activation handler asked to forward somewhere the table forbids.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MachineError {
    /// No rule for `signal` leads from `from` to `to`.
    #[error("{signal} transition not allowed: {from} -> {to}")]
    IllegalTransition {
        /// Signal being processed.
        signal: Signal,
        /// Rendered source state (`uninitialized` before the first transition).
        from: String,
        /// Rendered destination state.
        to: String,
    },

    /// The activation handler of `state` failed; the state was not entered.
    #[error("activation of {state} failed: {source}")]
    Handler {
        /// Rendered destination state.
        state: String,
        /// Error returned by the handler.
        #[source]
        source: BoxError,
    },

    /// A cascade forwarded more than `limit` times for a single signal.
    #[error("{signal} cascade exceeded {limit} forwards")]
    ForwardLimit {
        /// Signal being processed.
        signal: Signal,
        /// Configured depth limit.
        limit: usize,
    },

    /// The transition table names a state that has no activation handler.
    #[error("transition table targets {state} which has no activation handler")]
    UnknownState {
        /// Rendered state.
        state: String,
    },
}

impl MachineError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use vigil::{MachineError, Signal};
    ///
    /// let err = MachineError::ForwardLimit { signal: Signal::Wakeup, limit: 16 };
    /// assert_eq!(err.as_label(), "machine_forward_limit");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MachineError::IllegalTransition { .. } => "machine_illegal_transition",
            MachineError::Handler { .. } => "machine_handler_failed",
            MachineError::ForwardLimit { .. } => "machine_forward_limit",
            MachineError::UnknownState { .. } => "machine_unknown_state",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            MachineError::IllegalTransition { signal, from, to } => {
                format!("illegal transition on {signal}: {from} -> {to}")
            }
            MachineError::Handler { state, source } => format!("handler {state}: {source}"),
            MachineError::ForwardLimit { signal, limit } => {
                format!("forward limit {limit} hit on {signal}")
            }
            MachineError::UnknownState { state } => format!("unknown state: {state}"),
        }
    }

    /// True for table violations, the only machine errors that are never retried.
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, MachineError::IllegalTransition { .. })
    }
}

/// # Errors produced by the orchestrator API.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A resource with this name is already registered.
    #[error("resource [{name}] already exists")]
    DuplicateResource {
        /// Name of the rejected resource.
        name: String,
    },

    /// Registration attempted after the readiness pipeline started.
    #[error("resource [{name}] registered after wake up")]
    RegistrationClosed {
        /// Name of the rejected resource.
        name: String,
    },

    /// The caller-side wait elapsed. The underlying work keeps running.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Entry point that timed out (`wake_up`, `healthcheck`, ...).
        operation: &'static str,
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The state machine rejected a transition.
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// The background task driving a signal panicked or was aborted.
    #[error("{operation} aborted: {reason}")]
    Aborted {
        /// Entry point whose task died.
        operation: &'static str,
        /// Join error rendered as text.
        reason: String,
    },
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use vigil::OrchestratorError;
    /// use std::time::Duration;
    ///
    /// let err = OrchestratorError::Timeout { operation: "wake_up", timeout: Duration::from_millis(100) };
    /// assert_eq!(err.as_label(), "orchestrator_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::DuplicateResource { .. } => "orchestrator_duplicate_resource",
            OrchestratorError::RegistrationClosed { .. } => "orchestrator_registration_closed",
            OrchestratorError::Timeout { .. } => "orchestrator_timeout",
            OrchestratorError::Machine(e) => e.as_label(),
            OrchestratorError::Aborted { .. } => "orchestrator_aborted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OrchestratorError::DuplicateResource { name } => format!("duplicate resource: {name}"),
            OrchestratorError::RegistrationClosed { name } => {
                format!("registration closed: {name}")
            }
            OrchestratorError::Timeout { operation, timeout } => {
                format!("{operation} timeout: {timeout:?}")
            }
            OrchestratorError::Machine(e) => e.as_message(),
            OrchestratorError::Aborted { operation, reason } => {
                format!("{operation} aborted: {reason}")
            }
        }
    }

    /// True when the error only reports an elapsed caller-side wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OrchestratorError::Timeout { .. })
    }
}

/// # Rejection reported by a resource hook.
///
/// Hooks return `Err(HookError)` to reject; a hook that panics is reported as
/// [`HookError::Panicked`]. Both are treated the same way by phase aggregation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The hook rejected with a reason.
    #[error("{reason}")]
    Failed {
        /// Reason supplied by the hook.
        reason: String,
    },

    /// The hook panicked.
    #[error("hook panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl HookError {
    /// Builds a [`HookError::Failed`] from anything printable.
    pub fn fail(reason: impl std::fmt::Display) -> Self {
        HookError::Failed {
            reason: reason.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HookError::Failed { .. } => "hook_failed",
            HookError::Panicked { .. } => "hook_panicked",
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        HookError::Panicked { info }
    }
}

impl From<&str> for HookError {
    fn from(reason: &str) -> Self {
        HookError::fail(reason)
    }
}

impl From<String> for HookError {
    fn from(reason: String) -> Self {
        HookError::Failed { reason }
    }
}

/// # Aggregated outcome of a phase that stops the pipeline.
///
/// Carried as the error annotation of a forwarding transition. It never surfaces
/// from the public API; the state machine logs it when the transition commits.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum PhaseFailure {
    /// At least one hook rejected. Only rejecting resources are listed.
    #[error("{phase} rejected by {}", names(.reasons.keys()))]
    Rejected {
        /// Phase that was running.
        phase: String,
        /// Rejection reason per resource.
        reasons: BTreeMap<String, HookError>,
    },

    /// Every check ran but at least one returned `false`.
    #[error("check failed for {}", names(.checks.iter().filter(|(_, ok)| !**ok).map(|(n, _)| n)))]
    CheckFailed {
        /// Check result per resource.
        checks: BTreeMap<String, bool>,
    },

    /// Activation verdicts asked to kill or reported the system unhealthy.
    #[error("{phase} verdicts: {verdicts:?}")]
    Verdicts {
        /// Phase that was running.
        phase: String,
        /// Verdict per resource.
        verdicts: BTreeMap<String, Verdict>,
    },

    /// At least one `sick` hook decided to kill.
    #[error("killed by {}", names(.killers.iter().map(|(n, _)| n)))]
    Killers {
        /// Name and rendered value of every resource that decided to kill.
        killers: Vec<(String, String)>,
    },
}

impl PhaseFailure {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PhaseFailure::Rejected { .. } => "phase_rejected",
            PhaseFailure::CheckFailed { .. } => "phase_check_failed",
            PhaseFailure::Verdicts { .. } => "phase_verdicts",
            PhaseFailure::Killers { .. } => "phase_killers",
        }
    }
}

fn names<'a>(it: impl Iterator<Item = &'a String>) -> String {
    it.map(String::as_str).collect::<Vec<_>>().join(", ")
}
