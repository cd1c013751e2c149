//! Routes queue messages to event handlers.

use std::collections::HashMap;
use std::sync::Arc;

use messaging::{EventEnvelope, EventType, QueueClient, QueueMessage};

use crate::handler::EventHandler;

/// What `process_message` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Handled successfully and deleted.
    Acknowledged,

    /// No handler for the event type; deleted without side effects.
    Ignored,

    /// Body or payload could not be parsed; left for redelivery.
    ParseFailed,

    /// The handler failed; left for redelivery.
    HandlerFailed,

    /// The message should have been deleted but the delete failed.
    AckFailed,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Acknowledged => "acknowledged",
            ProcessOutcome::Ignored => "ignored",
            ProcessOutcome::ParseFailed => "parse_failed",
            ProcessOutcome::HandlerFailed => "handler_failed",
            ProcessOutcome::AckFailed => "ack_failed",
        }
    }

    /// Returns true if the message was removed from the queue.
    pub fn is_deleted(&self) -> bool {
        matches!(self, ProcessOutcome::Acknowledged | ProcessOutcome::Ignored)
    }
}

impl std::fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects handlers before the dispatcher is built.
///
/// There is at most one handler per event type; registering a second one
/// for the same type replaces the first.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event_type`, replacing any previous handler.
    pub fn register(mut self, event_type: EventType, handler: impl EventHandler + 'static) -> Self {
        let name = handler.name();
        if let Some(previous) = self.handlers.insert(event_type, Arc::new(handler)) {
            tracing::warn!(
                %event_type,
                previous = previous.name(),
                handler = name,
                "replacing registered event handler"
            );
        }
        self
    }

    /// Builds a dispatcher acknowledging messages on `queue_url`.
    pub fn build<Q: QueueClient>(self, queue: Q, queue_url: impl Into<String>) -> EventDispatcher<Q> {
        EventDispatcher {
            queue,
            queue_url: queue_url.into(),
            handlers: self.handlers,
        }
    }
}

/// Parses raw queue messages and invokes the handler registered for their type.
///
/// The handler mapping is fixed once built. A message is deleted only after
/// its handler succeeded, or when no handler cares about its type.
pub struct EventDispatcher<Q: QueueClient> {
    queue: Q,
    queue_url: String,
    handlers: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl<Q: QueueClient> EventDispatcher<Q> {
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Processes one received message.
    ///
    /// Never fails: every error is logged and reflected in the outcome.
    #[tracing::instrument(skip(self, message), fields(message_id = message.message_id, receive_count = message.receive_count))]
    pub async fn process_message(&self, message: &QueueMessage) -> ProcessOutcome {
        let (event_type, outcome) = self.dispatch(message).await;
        metrics::counter!(
            "saga_messages_total",
            "event_type" => event_type,
            "outcome" => outcome.as_str()
        )
        .increment(1);
        outcome
    }

    /// Handles one message, returning a bounded metric label for its type.
    async fn dispatch(&self, message: &QueueMessage) -> (&'static str, ProcessOutcome) {
        let envelope = match EventEnvelope::from_json(&message.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse message, leaving it for redelivery");
                return ("unparseable", ProcessOutcome::ParseFailed);
            }
        };
        let known = envelope.known_event_type();
        let label = known.map_or("unknown", |event_type| event_type.as_str());

        let Some(handler) = known.and_then(|event_type| self.handlers.get(&event_type)) else {
            tracing::info!(
                event_id = %envelope.event_id,
                event_type = %envelope.event_type,
                "no handler registered, discarding message"
            );
            return (label, self.acknowledge(message, ProcessOutcome::Ignored).await);
        };

        let typed = match envelope.decode() {
            Ok(typed) => typed,
            Err(e) => {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    error = %e,
                    "failed to decode payload, leaving it for redelivery"
                );
                return (label, ProcessOutcome::ParseFailed);
            }
        };

        match handler.handle(&typed).await {
            Ok(()) => {
                tracing::debug!(
                    event_id = %typed.event_id,
                    handler = handler.name(),
                    "event handled"
                );
                (label, self.acknowledge(message, ProcessOutcome::Acknowledged).await)
            }
            Err(e) => {
                tracing::error!(
                    event_id = %typed.event_id,
                    aggregate_id = %typed.aggregate_id,
                    handler = handler.name(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "handler failed, leaving message for redelivery"
                );
                (label, ProcessOutcome::HandlerFailed)
            }
        }
    }

    async fn acknowledge(&self, message: &QueueMessage, outcome: ProcessOutcome) -> ProcessOutcome {
        match self
            .queue
            .delete(&self.queue_url, &message.receipt_handle)
            .await
        {
            Ok(()) => outcome,
            Err(e) => {
                tracing::error!(
                    queue_url = %self.queue_url,
                    receipt_handle = %message.receipt_handle,
                    error = %e,
                    "failed to delete message"
                );
                ProcessOutcome::AckFailed
            }
        }
    }
}
