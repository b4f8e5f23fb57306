//! Test doubles shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::machine::Signal;
use crate::orchestrator::Terminator;
use crate::subscribers::Subscribe;

/// Subscriber that keeps every event it receives.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Terminator that only records the signals it was called with.
#[derive(Default)]
pub(crate) struct Exits {
    signals: Mutex<Vec<Signal>>,
}

impl Exits {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn signals(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }
}

impl Terminator for Exits {
    fn terminate(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }
}
