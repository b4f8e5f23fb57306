//! # Orchestrator states and their transition table.

use std::fmt;

use serde::Serialize;

use crate::machine::{Signal, TransitionTable};

/// State of the orchestrator's machine.
///
/// Five working phases plus the terminal [`Mood::Terminate`]. Before the first
/// `wake_up()` the machine has no mood at all (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    /// Resources acquire their values (`need`).
    Initialize,
    /// Resources validate their values (`check`).
    Check,
    /// Resources start serving (`activate`).
    Activate,
    /// Every resource reported healthy.
    Healthy,
    /// At least one resource reported unhealthy.
    Sick,
    /// The terminator was invoked.
    Terminate,
}

impl Mood {
    /// All moods in pipeline order.
    pub const ALL: [Mood; 6] = [
        Mood::Initialize,
        Mood::Check,
        Mood::Activate,
        Mood::Healthy,
        Mood::Sick,
        Mood::Terminate,
    ];

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Mood::Initialize => "initialize",
            Mood::Check => "check",
            Mood::Activate => "activate",
            Mood::Healthy => "healthy",
            Mood::Sick => "sick",
            Mood::Terminate => "terminate",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lifecycle table.
///
/// `rule`s are what a signal looks up. `forward` edges only widen where a phase may
/// forward while that signal cascades (a `sick` phase deciding to kill during
/// `wakeup`, the `refresh` pipeline past `initialize`, a `healthy` phase rejecting
/// during `health`).
pub(crate) fn lifecycle() -> TransitionTable<Mood> {
    use Mood::*;

    TransitionTable::builder()
        .rule(Signal::Wakeup, None, Initialize, Terminate)
        .rule(Signal::Wakeup, Initialize, Check, Terminate)
        .rule(Signal::Wakeup, Check, Activate, Terminate)
        .rule(Signal::Wakeup, Activate, Healthy, Terminate)
        .rule(Signal::Wakeup, Activate, Sick, Terminate)
        .rule(Signal::Wakeup, Healthy, Sick, Terminate)
        .forward(Signal::Wakeup, Sick, Terminate)
        //
        .rule(Signal::Refresh, Healthy, Initialize, Terminate)
        .forward(Signal::Refresh, Initialize, Check)
        .forward(Signal::Refresh, Initialize, Terminate)
        .forward(Signal::Refresh, Check, Activate)
        .forward(Signal::Refresh, Check, Terminate)
        .forward(Signal::Refresh, Activate, Healthy)
        .forward(Signal::Refresh, Activate, Sick)
        .forward(Signal::Refresh, Activate, Terminate)
        .forward(Signal::Refresh, Sick, Terminate)
        //
        .rule(Signal::Health, Healthy, Healthy, Sick)
        .rule(Signal::Health, Sick, Healthy, Terminate)
        .forward(Signal::Health, Healthy, Terminate)
        //
        .rule(Signal::Sick, Healthy, Sick, Terminate)
        .rule(Signal::Sick, Sick, Sick, Terminate)
        .rule(Signal::Sick, Sick, Healthy, Terminate)
        //
        .rule(Signal::Stop, Healthy, Terminate, Terminate)
        .rule(Signal::Stop, Sick, Terminate, Terminate)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wakeup_starts_from_uninitialized() {
        let table = lifecycle();
        let rule = table.lookup(Signal::Wakeup, None).expect("wakeup rule");
        assert_eq!((rule.success, rule.failure), (Mood::Initialize, Mood::Terminate));
    }

    #[test]
    fn test_health_from_healthy_falls_back_to_sick() {
        let table = lifecycle();
        let rule = table.lookup(Signal::Health, Some(Mood::Healthy)).expect("rule");
        assert_eq!((rule.success, rule.failure), (Mood::Healthy, Mood::Sick));
        assert!(table.is_allowed(Signal::Health, Some(Mood::Healthy), Mood::Terminate));
    }

    #[test]
    fn test_sick_signal_in_sick_reenters_sick() {
        let table = lifecycle();
        let rule = table.lookup(Signal::Sick, Some(Mood::Sick)).expect("rule");
        assert_eq!(rule.success, Mood::Sick);
    }

    #[test]
    fn test_every_phase_may_reach_terminate_while_cascading() {
        let table = lifecycle();
        for (signal, from) in [
            (Signal::Wakeup, Mood::Initialize),
            (Signal::Wakeup, Mood::Check),
            (Signal::Wakeup, Mood::Activate),
            (Signal::Wakeup, Mood::Healthy),
            (Signal::Wakeup, Mood::Sick),
            (Signal::Refresh, Mood::Sick),
            (Signal::Health, Mood::Healthy),
            (Signal::Sick, Mood::Sick),
        ] {
            assert!(
                table.is_allowed(signal, Some(from), Mood::Terminate),
                "{signal}: {from} -> terminate"
            );
        }
    }

    #[test]
    fn test_wakeup_and_refresh_are_ignored_in_sick() {
        let table = lifecycle();
        assert!(table.lookup(Signal::Wakeup, Some(Mood::Sick)).is_none());
        assert!(table.lookup(Signal::Refresh, Some(Mood::Sick)).is_none());
        assert!(table.lookup(Signal::Refresh, Some(Mood::Initialize)).is_none());
    }

    #[test]
    fn test_refresh_cascade_reaches_every_phase() {
        let table = lifecycle();
        for (from, to) in [
            (Mood::Healthy, Mood::Initialize),
            (Mood::Initialize, Mood::Check),
            (Mood::Check, Mood::Activate),
            (Mood::Activate, Mood::Healthy),
            (Mood::Activate, Mood::Sick),
        ] {
            assert!(table.is_allowed(Signal::Refresh, Some(from), to), "{from} -> {to}");
        }
    }

    #[test]
    fn test_stop_is_ignored_before_wakeup() {
        assert!(lifecycle().lookup(Signal::Stop, None).is_none());
    }

    #[test]
    fn test_mood_serializes_lowercase() {
        let json = serde_json::to_string(&Mood::Healthy).expect("serialize");
        assert_eq!(json, "\"healthy\"");
    }
}
