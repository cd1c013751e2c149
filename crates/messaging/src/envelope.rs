//! Versioned event envelope placed on queues.

use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};

use crate::error::{MessagingError, Result};
use crate::events::{EventType, SagaEvent};

/// Envelope schema version written by this service.
pub const ENVELOPE_VERSION: u32 = 1;

/// An event together with the metadata every queue consumer relies on.
///
/// On the wire the payload is arbitrary JSON (`EventEnvelope<serde_json::Value>`);
/// after [`EventEnvelope::decode`] it is a typed [`SagaEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope<P = serde_json::Value> {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Wire tag of the event, e.g. `BUDGET_APPROVED`.
    pub event_type: String,

    /// The order this event belongs to.
    pub aggregate_id: String,

    /// When the event was produced.
    pub timestamp: DateTime<Utc>,

    /// Envelope schema version.
    pub version: u32,

    /// Name of the producing service.
    pub source: String,

    /// Event-specific data.
    pub payload: P,
}

impl<P> EventEnvelope<P> {
    /// Replaces the payload, keeping every metadata field.
    pub fn map_payload<T>(self, f: impl FnOnce(P) -> T) -> EventEnvelope<T> {
        EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type,
            aggregate_id: self.aggregate_id,
            timestamp: self.timestamp,
            version: self.version,
            source: self.source,
            payload: f(self.payload),
        }
    }
}

impl EventEnvelope<SagaEvent> {
    /// Wraps an event in a fresh envelope (new event ID, current time, current schema version).
    pub fn new(event: SagaEvent, aggregate_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event.event_type().as_str().to_string(),
            aggregate_id: aggregate_id.into(),
            timestamp: Utc::now(),
            version: ENVELOPE_VERSION,
            source: source.into(),
            payload: event,
        }
    }

    /// Converts the typed envelope into its wire form.
    pub fn to_wire(&self) -> Result<EventEnvelope> {
        let payload = self.payload.to_payload()?;
        Ok(self.clone().map_payload(|_| payload))
    }

    /// Serializes the envelope into a queue message body.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_wire()?)?)
    }
}

impl EventEnvelope {
    /// Parses a queue message body into a wire envelope.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Returns the event type if it is one this service understands.
    pub fn known_event_type(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// Decodes the payload into a typed [`SagaEvent`].
    pub fn decode(&self) -> Result<EventEnvelope<SagaEvent>> {
        let event_type: EventType = self.event_type.parse()?;
        let event = SagaEvent::decode(event_type, self.payload.clone())
            .map_err(MessagingError::Serialization)?;
        Ok(self.clone().map_payload(|_| event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BudgetRejectedPayload, OrderCreatedPayload};
    use common::{Money, OrderId};
    use serde_json::json;

    fn wire_body(event_type: &str, payload: serde_json::Value) -> String {
        json!({
            "eventId": "evt-1",
            "eventType": event_type,
            "aggregateId": "os-1",
            "timestamp": "2024-05-10T12:00:00Z",
            "version": 1,
            "source": "billing-service",
            "payload": payload
        })
        .to_string()
    }

    #[test]
    fn test_new_envelope_metadata() {
        let event = SagaEvent::BudgetRejected(BudgetRejectedPayload {
            order_id: OrderId::from("os-1"),
            budget_id: None,
            reason: Some("too expensive".to_string()),
        });

        let envelope = EventEnvelope::new(event, "os-1", "order-service");

        assert_eq!(envelope.event_type, "BUDGET_REJECTED");
        assert_eq!(envelope.aggregate_id, "os-1");
        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert_eq!(envelope.source, "order-service");
    }

    #[test]
    fn test_unique_event_ids() {
        let event = SagaEvent::BudgetRejected(BudgetRejectedPayload {
            order_id: OrderId::from("os-1"),
            budget_id: None,
            reason: None,
        });
        let a = EventEnvelope::new(event.clone(), "os-1", "order-service");
        let b = EventEnvelope::new(event, "os-1", "order-service");
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_wire_json_field_names() {
        let event = SagaEvent::OrderCreated(OrderCreatedPayload {
            order_id: OrderId::from("os-1"),
            customer_id: None,
            vehicle_id: None,
            status: "received".to_string(),
            current_status: None,
            total_value: Money::zero(),
        });
        let envelope = EventEnvelope::new(event, "os-1", "order-service");

        let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["eventType"], "ORDER_CREATED");
        assert_eq!(value["aggregateId"], "os-1");
        assert_eq!(value["version"], 1);
        assert_eq!(value["source"], "order-service");
        assert_eq!(value["payload"]["orderId"], "os-1");
        assert!(value["eventId"].is_string());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_parse_and_decode() {
        let body = wire_body("BUDGET_REJECTED", json!({"orderId": "os-1", "reason": "no"}));

        let raw = EventEnvelope::from_json(&body).unwrap();
        assert_eq!(raw.known_event_type(), Some(EventType::BudgetRejected));

        let typed = raw.decode().unwrap();
        assert_eq!(typed.event_id.as_str(), "evt-1");
        assert_eq!(typed.source, "billing-service");
        assert_eq!(typed.payload.event_type(), EventType::BudgetRejected);
    }

    #[test]
    fn test_parse_failure() {
        assert!(EventEnvelope::from_json("not json").is_err());
        assert!(EventEnvelope::from_json("{\"eventType\": \"BUDGET_REJECTED\"}").is_err());
    }

    #[test]
    fn test_unknown_event_type_is_parsed_but_not_known() {
        let body = wire_body("INVOICE_ISSUED", json!({"invoice": 1}));

        let raw = EventEnvelope::from_json(&body).unwrap();

        assert_eq!(raw.known_event_type(), None);
        assert!(matches!(
            raw.decode(),
            Err(MessagingError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_decode_failure_on_bad_payload() {
        let body = wire_body("EXECUTION_FINISHED", json!({"orderId": 42}));

        let raw = EventEnvelope::from_json(&body).unwrap();

        assert!(matches!(raw.decode(), Err(MessagingError::Serialization(_))));
    }
}
