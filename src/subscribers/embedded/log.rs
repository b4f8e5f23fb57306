//! # LogWriter — leveled event logger
//!
//! A subscriber that turns incoming [`Event`]s into `tracing` records, acting as the
//! logging sink of the orchestrator. Install any `tracing` subscriber to see them.
//!
//! ## Levels
//! - `error`: rejections, failed transitions, annotated transitions, timeouts, panics
//! - `info`: state entries, phase verdicts, probe results, termination
//! - `debug`: signal lookups and transition attempts
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG vigil: signal received signal=wakeup from=uninitialized
//! INFO  vigil: state entered signal=wakeup from=check to=activate
//! ERROR vigil: phase rejected phase=initialize resources=config reason="initialize rejected by config"
//! INFO  vigil: terminating signal=wakeup
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event logger subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn s(field: &Option<Arc<str>>) -> &str {
    field.as_deref().unwrap_or("-")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let signal = e.signal.map(|sig| sig.as_str()).unwrap_or("-");
        match e.kind {
            EventKind::SignalReceived => {
                debug!(target: "vigil", signal, from = s(&e.from), "signal received");
            }
            EventKind::SignalIgnored => {
                debug!(target: "vigil", signal, from = s(&e.from), "signal ignored: no rule");
            }
            EventKind::TransitionAttempt => {
                debug!(target: "vigil", signal, from = s(&e.from), to = s(&e.state), "try change state");
            }
            EventKind::TransitionAnnotated => {
                error!(target: "vigil", signal, from = s(&e.from), to = s(&e.state), reason = s(&e.reason), "error in transition");
            }
            EventKind::StateEntered => {
                info!(target: "vigil", signal, from = s(&e.from), to = s(&e.state), "state entered");
            }
            EventKind::TransitionFailed => {
                error!(target: "vigil", signal, from = s(&e.from), fallback = s(&e.state), reason = s(&e.reason), "transition failed");
            }
            EventKind::SignalProcessed => match &e.reason {
                Some(reason) => {
                    error!(target: "vigil", signal, state = s(&e.state), reason = &**reason, "signal failed");
                }
                None => {
                    debug!(target: "vigil", signal, state = s(&e.state), "signal processed");
                }
            },
            EventKind::ListenerPanicked => {
                error!(target: "vigil", state = s(&e.state), reason = s(&e.reason), "listener panicked");
            }
            EventKind::PhaseRejected => {
                error!(target: "vigil", phase = s(&e.state), resources = s(&e.resource), reason = s(&e.reason), "phase rejected");
            }
            EventKind::PhaseVerdict => {
                info!(target: "vigil", phase = s(&e.state), resource = s(&e.resource), decision = s(&e.reason), "phase verdict");
            }
            EventKind::HookFailed => {
                warn!(target: "vigil", resource = s(&e.resource), reason = s(&e.reason), "hook failed");
            }
            EventKind::HealthcheckCompleted => {
                info!(target: "vigil", signal, result = s(&e.reason), "healthcheck completed");
            }
            EventKind::TimeoutHit => {
                error!(target: "vigil", operation = s(&e.reason), timeout_ms = ?e.timeout_ms, "timeout");
            }
            EventKind::Terminating => {
                info!(target: "vigil", signal, "terminating");
            }
            EventKind::ShutdownRequested => {
                info!(target: "vigil", "shutdown requested");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "vigil", subscriber = s(&e.resource), reason = s(&e.reason), "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "vigil", subscriber = s(&e.resource), reason = s(&e.reason), "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
