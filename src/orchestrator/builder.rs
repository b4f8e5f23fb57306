use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::{
    config::Config,
    error::OrchestratorError,
    events::Bus,
    machine::StateMachine,
    subscribers::{Subscribe, SubscriberSet},
};

use super::{
    mood,
    phases::Phases,
    registry::Registry,
    runtime::Orchestrator,
    terminator::{ProcessExit, Terminator},
};

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    terminator: Option<Arc<dyn Terminator>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            terminator: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (signals, transitions, phase verdicts, probes)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the default [`ProcessExit`] terminator.
    pub fn with_terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = Some(terminator);
        self
    }

    /// Builds the orchestrator.
    ///
    /// Wires the event bus, the resource registry, one phase handler per mood and the
    /// state machine. With subscribers configured this spawns their workers, so it must
    /// then run inside a tokio runtime.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let bus = Bus::from_config(&self.cfg);
        let registry = Registry::new();
        let terminator = self
            .terminator
            .unwrap_or_else(|| Arc::new(ProcessExit) as Arc<dyn Terminator>);
        let phases = Phases::new(Arc::clone(&registry), terminator, bus.clone());

        let mut machine = StateMachine::builder(mood::lifecycle())
            .with_bus(bus.clone())
            .max_forwards(self.cfg.max_forwards);
        for (mood, phase) in phases.handlers() {
            machine = machine.handler(mood, phase);
        }
        let machine = Arc::new(machine.build()?);

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, subs);
        }

        Ok(Orchestrator::new_internal(self.cfg, bus, registry, machine))
    }
}

/// Forwards bus events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, subs: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => subs.emit(&ev),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        subs.shutdown().await;
    });
}
