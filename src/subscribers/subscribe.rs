//! # Subscriber trait
//!
//! Anything that wants to see the orchestrator's events (a log sink, a metrics
//! exporter, a pager) implements [`Subscribe`] and is handed to
//! `OrchestratorBuilder::with_subscribers`.
//!
//! Each subscriber gets its own bounded queue and worker inside the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet): a slow `on_event` delays only
//! that subscriber, never a signal cascade. When the queue is full the event is
//! dropped for that subscriber and a `SubscriberOverflow` event is published.

use async_trait::async_trait;

use crate::events::Event;

/// Receives runtime events on a dedicated worker task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. A panic here is caught and reported as `SubscriberPanicked`.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
