//! # Transition table.
//!
//! Rules are grouped per [`Signal`] in an ordered list. For a given signal the first
//! rule whose `from` matches the current state wins; when none matches the signal is
//! ignored.
//!
//! Forward-only edges widen where an activation handler may forward while a signal
//! cascades. They are never looked up, so they cannot make a signal apply to a state
//! it would otherwise ignore.
//!
//! ## Example
//! ```rust
//! use vigil::{Signal, TransitionTable};
//!
//! let table = TransitionTable::builder()
//!     .rule(Signal::Wakeup, None, "up", "down")
//!     .rule(Signal::Stop, "up", "down", "down")
//!     .forward(Signal::Wakeup, "up", "down")
//!     .build();
//!
//! assert_eq!(table.lookup(Signal::Wakeup, None).map(|r| r.success), Some("up"));
//! assert!(table.lookup(Signal::Stop, None).is_none());
//! assert!(table.is_allowed(Signal::Stop, Some("up"), "down"));
//! assert!(table.lookup(Signal::Wakeup, Some("up")).is_none());
//! assert!(table.is_allowed(Signal::Wakeup, Some("up"), "down"));
//! ```

use std::collections::HashMap;

use super::signal::{Signal, State};

/// `(from, success, failure)` for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule<S> {
    /// State the rule applies to; `None` is the uninitialized pseudo-state.
    pub from: Option<S>,
    /// Target tried first.
    pub success: S,
    /// Target tried when the success attempt fails.
    pub failure: S,
}

/// `from → to` edges a forward may take, per signal.
type Edges<S> = HashMap<Signal, Vec<(Option<S>, S)>>;

/// Immutable signal → ordered rules map, plus forward-only edges.
#[derive(Debug, Clone)]
pub struct TransitionTable<S> {
    rules: HashMap<Signal, Vec<TransitionRule<S>>>,
    forwards: Edges<S>,
}

impl<S: State> TransitionTable<S> {
    /// Starts an empty table.
    pub fn builder() -> TransitionTableBuilder<S> {
        TransitionTableBuilder {
            rules: HashMap::new(),
            forwards: HashMap::new(),
        }
    }

    /// Rules declared for `signal`, in declaration order.
    pub fn rules(&self, signal: Signal) -> &[TransitionRule<S>] {
        self.rules.get(&signal).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First rule for `signal` whose `from` equals `current`.
    pub fn lookup(&self, signal: Signal, current: Option<S>) -> Option<&TransitionRule<S>> {
        self.rules(signal).iter().find(|r| r.from == current)
    }

    /// True when some rule for `signal` starting at `from` names `to` as its success
    /// or failure target, or a forward-only edge leads there.
    pub fn is_allowed(&self, signal: Signal, from: Option<S>, to: S) -> bool {
        let by_rule = self
            .rules(signal)
            .iter()
            .any(|r| r.from == from && (r.success == to || r.failure == to));
        by_rule
            || self
                .forwards
                .get(&signal)
                .is_some_and(|edges| edges.contains(&(from, to)))
    }

    /// Every state a transition can land in, rules and forward-only edges alike.
    pub fn targets(&self) -> impl Iterator<Item = S> + '_ {
        let by_rule = self
            .rules
            .values()
            .flatten()
            .flat_map(|r| [r.success, r.failure]);
        let by_edge = self.forwards.values().flatten().map(|&(_, to)| to);
        by_rule.chain(by_edge)
    }
}

/// Fluent builder for [`TransitionTable`].
#[derive(Debug)]
pub struct TransitionTableBuilder<S> {
    rules: HashMap<Signal, Vec<TransitionRule<S>>>,
    forwards: Edges<S>,
}

impl<S: State> TransitionTableBuilder<S> {
    /// Appends a rule for `signal`.
    pub fn rule(mut self, signal: Signal, from: impl Into<Option<S>>, success: S, failure: S) -> Self {
        self.rules.entry(signal).or_default().push(TransitionRule {
            from: from.into(),
            success,
            failure,
        });
        self
    }

    /// Allows a handler to forward `from → to` while `signal` cascades. Not a rule:
    /// `signal` arriving in `from` is still ignored unless a rule says otherwise.
    pub fn forward(mut self, signal: Signal, from: impl Into<Option<S>>, to: S) -> Self {
        self.forwards
            .entry(signal)
            .or_default()
            .push((from.into(), to));
        self
    }

    /// Freezes the table.
    pub fn build(self) -> TransitionTable<S> {
        TransitionTable {
            rules: self.rules,
            forwards: self.forwards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TransitionTable<&'static str> {
        TransitionTable::builder()
            .rule(Signal::Sick, "healthy", "sick", "dead")
            .rule(Signal::Sick, "sick", "sick", "dead")
            .rule(Signal::Sick, "sick", "healthy", "dead")
            .build()
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let t = table();
        let rule = t.lookup(Signal::Sick, Some("sick")).expect("rule");
        assert_eq!(rule.success, "sick");
    }

    #[test]
    fn test_later_rules_still_allow_their_targets() {
        let t = table();
        assert!(t.is_allowed(Signal::Sick, Some("sick"), "healthy"));
        assert!(t.is_allowed(Signal::Sick, Some("sick"), "dead"));
        assert!(!t.is_allowed(Signal::Sick, Some("dead"), "sick"));
        assert!(!t.is_allowed(Signal::Health, Some("sick"), "healthy"));
    }

    #[test]
    fn test_unknown_signal_has_no_rules() {
        let t = table();
        assert!(t.rules(Signal::Stop).is_empty());
        assert!(t.lookup(Signal::Stop, Some("healthy")).is_none());
    }

    #[test]
    fn test_forward_edge_is_allowed_but_never_looked_up() {
        let t = TransitionTable::builder()
            .rule(Signal::Refresh, "healthy", "init", "dead")
            .forward(Signal::Refresh, "sick", "dead")
            .build();

        assert!(t.lookup(Signal::Refresh, Some("sick")).is_none());
        assert!(t.is_allowed(Signal::Refresh, Some("sick"), "dead"));
        assert!(!t.is_allowed(Signal::Wakeup, Some("sick"), "dead"));
        assert!(t.targets().any(|s| s == "dead"));
    }

    #[test]
    fn test_targets_cover_success_and_failure() {
        let mut targets: Vec<_> = table().targets().collect();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets, ["dead", "healthy", "sick"]);
    }
}
