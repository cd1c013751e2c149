//! Fire-and-forget event publisher.

use common::EventId;

use crate::envelope::EventEnvelope;
use crate::events::SagaEvent;
use crate::queue::QueueClient;

/// What happened to a publish call.
///
/// Delivery failures are never surfaced as errors; this value only exists so
/// callers and tests can observe the fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No outbound queue is configured; nothing was sent.
    Disabled,

    /// The envelope could not be serialized; nothing was sent.
    Unserializable,

    /// The envelope was built and delivery was attempted.
    Published(PublishReport),
}

/// Per-queue delivery results of one published envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: EventId,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Builds envelopes and fans them out to the outbound queue plus any extra queues.
///
/// There is no outbox or retry: an envelope that fails to reach a queue is logged
/// and dropped.
pub struct EventPublisher<Q: QueueClient> {
    queue: Q,
    outbound_queue_url: String,
    source: String,
}

impl<Q: QueueClient> EventPublisher<Q> {
    /// Creates a publisher. An empty `outbound_queue_url` disables publishing.
    pub fn new(queue: Q, outbound_queue_url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            queue,
            outbound_queue_url: outbound_queue_url.into(),
            source: source.into(),
        }
    }

    /// Returns true if an outbound queue is configured.
    pub fn is_enabled(&self) -> bool {
        !self.outbound_queue_url.is_empty()
    }

    /// Returns the producing-service name stamped on envelopes.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the underlying queue client.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Publishes `event` for `aggregate_id` to the outbound queue and every URL in `extra_queues`.
    #[tracing::instrument(skip(self, event, extra_queues), fields(event_type = %event.event_type()))]
    pub async fn publish(
        &self,
        aggregate_id: &str,
        event: SagaEvent,
        extra_queues: &[String],
    ) -> PublishOutcome {
        if !self.is_enabled() {
            tracing::debug!("outbound queue not configured, event not published");
            return PublishOutcome::Disabled;
        }

        let event_type = event.event_type();
        let envelope = EventEnvelope::new(event, aggregate_id, self.source.as_str());
        let body = match envelope.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event envelope");
                metrics::counter!("event_publish_failures_total", "event_type" => event_type.as_str())
                    .increment(1);
                return PublishOutcome::Unserializable;
            }
        };

        let mut targets: Vec<&str> = vec![self.outbound_queue_url.as_str()];
        for url in extra_queues {
            if !url.is_empty() && !targets.contains(&url.as_str()) {
                targets.push(url);
            }
        }

        let mut report = PublishReport {
            event_id: envelope.event_id.clone(),
            delivered: Vec::new(),
            failed: Vec::new(),
        };

        for queue_url in targets {
            match self.queue.send(queue_url, &body).await {
                Ok(message_id) => {
                    tracing::info!(
                        event_id = %envelope.event_id,
                        queue_url,
                        message_id,
                        "event published"
                    );
                    metrics::counter!("events_published_total", "event_type" => event_type.as_str())
                        .increment(1);
                    report.delivered.push(queue_url.to_string());
                }
                Err(e) => {
                    tracing::error!(
                        event_id = %envelope.event_id,
                        queue_url,
                        error = %e,
                        "failed to publish event"
                    );
                    metrics::counter!("event_publish_failures_total", "event_type" => event_type.as_str())
                        .increment(1);
                    report.failed.push(queue_url.to_string());
                }
            }
        }

        PublishOutcome::Published(report)
    }
}
