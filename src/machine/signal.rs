//! Signals and the state alphabet contract.

use std::fmt;
use std::hash::Hash;

use serde::Serialize;

/// External stimulus requesting a state transition. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Start the readiness pipeline.
    Wakeup,
    /// Re-run the readiness pipeline from a healthy state.
    Refresh,
    /// A probe found every resource healthy.
    Health,
    /// A probe found at least one resource unhealthy.
    Sick,
    /// Orderly shutdown.
    Stop,
}

impl Signal {
    /// Every signal, in declaration order.
    pub const ALL: [Signal; 5] = [
        Signal::Wakeup,
        Signal::Refresh,
        Signal::Health,
        Signal::Sick,
        Signal::Stop,
    ];

    /// Lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Signal::Wakeup => "wakeup",
            Signal::Refresh => "refresh",
            Signal::Health => "health",
            Signal::Sick => "sick",
            Signal::Stop => "stop",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state identifier: a small closed enum owned by whoever configures the machine.
///
/// The uninitialized pseudo-state is not part of the alphabet; the machine models it
/// as `None`.
pub trait State: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> State for T where T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Renders an optional state for logs and error messages.
pub(crate) fn render<S: State>(state: Option<S>) -> String {
    match state {
        Some(s) => s.to_string(),
        None => "uninitialized".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_names_are_lowercase() {
        let names: Vec<_> = Signal::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["wakeup", "refresh", "health", "sick", "stop"]);
    }

    #[test]
    fn test_signal_serializes_as_name() {
        let json = serde_json::to_string(&Signal::Wakeup).expect("serialize");
        assert_eq!(json, "\"wakeup\"");
    }

    #[test]
    fn test_render_uninitialized() {
        assert_eq!(render::<Signal>(None), "uninitialized");
        assert_eq!(render(Some(Signal::Stop)), "stop");
    }
}
