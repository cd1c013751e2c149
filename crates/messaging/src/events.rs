//! Saga events exchanged between order management, billing and production.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::error::MessagingError;

/// The closed set of event types that make up the service-order saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Published here when an order is opened; consumed by billing.
    OrderCreated,
    /// Billing approved (and charged) the budget.
    BudgetApproved,
    /// Billing or the customer rejected the budget.
    BudgetRejected,
    /// Production started the repair work.
    ExecutionStarted,
    /// Production finished the repair work.
    ExecutionFinished,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::OrderCreated,
        EventType::BudgetApproved,
        EventType::BudgetRejected,
        EventType::ExecutionStarted,
        EventType::ExecutionFinished,
    ];

    /// Returns the wire tag for this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "ORDER_CREATED",
            EventType::BudgetApproved => "BUDGET_APPROVED",
            EventType::BudgetRejected => "BUDGET_REJECTED",
            EventType::ExecutionStarted => "EXECUTION_STARTED",
            EventType::ExecutionFinished => "EXECUTION_FINISHED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| MessagingError::UnknownEventType(s.to_string()))
    }
}

/// Payload of `ORDER_CREATED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedPayload {
    pub order_id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub vehicle_id: Option<VehicleId>,
    /// Always `"received"`: the status every order is created in.
    pub status: String,
    /// Lower-case status after creation-time transitions, when it differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,
    pub total_value: Money,
}

/// Payload of `BUDGET_APPROVED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetApprovedPayload {
    pub order_id: OrderId,
    pub budget_id: Option<String>,
    /// Sent by billing as a decimal currency amount (`200.5`).
    #[serde(default, with = "decimal_currency")]
    pub total_value: Option<Money>,
    pub payment_id: Option<String>,
    pub payment_status: Option<String>,
}

/// Serde adapter for optional amounts written in currency units rather than
/// cents. Amounts are rounded to the nearest cent, half away from zero.
mod decimal_currency {
    use common::Money;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Money>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(money) => serializer.serialize_f64(money.cents() as f64 / 100.0),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Money>, D::Error> {
        let Some(amount) = Option::<f64>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let cents = (amount * 100.0).round();
        if !cents.is_finite() || cents.abs() >= i64::MAX as f64 {
            return Err(D::Error::custom(format!("currency amount out of range: {amount}")));
        }
        Ok(Some(Money::from_cents(cents as i64)))
    }
}

/// Payload of `BUDGET_REJECTED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRejectedPayload {
    pub order_id: OrderId,
    pub budget_id: Option<String>,
    pub reason: Option<String>,
}

/// Payload of `EXECUTION_STARTED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStartedPayload {
    pub order_id: OrderId,
    pub execution_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Payload of `EXECUTION_FINISHED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFinishedPayload {
    pub order_id: OrderId,
    pub execution_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_days: Option<i64>,
}

/// A saga event with its typed payload.
///
/// The variant is selected by the envelope's `eventType` tag, which travels
/// next to the payload rather than inside it, so decoding goes through
/// [`SagaEvent::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum SagaEvent {
    OrderCreated(OrderCreatedPayload),
    BudgetApproved(BudgetApprovedPayload),
    BudgetRejected(BudgetRejectedPayload),
    ExecutionStarted(ExecutionStartedPayload),
    ExecutionFinished(ExecutionFinishedPayload),
}

impl SagaEvent {
    /// Returns the wire event type of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            SagaEvent::OrderCreated(_) => EventType::OrderCreated,
            SagaEvent::BudgetApproved(_) => EventType::BudgetApproved,
            SagaEvent::BudgetRejected(_) => EventType::BudgetRejected,
            SagaEvent::ExecutionStarted(_) => EventType::ExecutionStarted,
            SagaEvent::ExecutionFinished(_) => EventType::ExecutionFinished,
        }
    }

    /// Returns the order the payload refers to.
    pub fn order_id(&self) -> &OrderId {
        match self {
            SagaEvent::OrderCreated(p) => &p.order_id,
            SagaEvent::BudgetApproved(p) => &p.order_id,
            SagaEvent::BudgetRejected(p) => &p.order_id,
            SagaEvent::ExecutionStarted(p) => &p.order_id,
            SagaEvent::ExecutionFinished(p) => &p.order_id,
        }
    }

    /// Decodes a raw JSON payload according to its event type tag.
    pub fn decode(
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::OrderCreated => SagaEvent::OrderCreated(serde_json::from_value(payload)?),
            EventType::BudgetApproved => {
                SagaEvent::BudgetApproved(serde_json::from_value(payload)?)
            }
            EventType::BudgetRejected => {
                SagaEvent::BudgetRejected(serde_json::from_value(payload)?)
            }
            EventType::ExecutionStarted => {
                SagaEvent::ExecutionStarted(serde_json::from_value(payload)?)
            }
            EventType::ExecutionFinished => {
                SagaEvent::ExecutionFinished(serde_json::from_value(payload)?)
            }
        })
    }

    /// Encodes the payload (without the type tag) as JSON.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            SagaEvent::OrderCreated(p) => serde_json::to_value(p),
            SagaEvent::BudgetApproved(p) => serde_json::to_value(p),
            SagaEvent::BudgetRejected(p) => serde_json::to_value(p),
            SagaEvent::ExecutionStarted(p) => serde_json::to_value(p),
            SagaEvent::ExecutionFinished(p) => serde_json::to_value(p),
        }
    }
}
