//! Saga handlers for events consumed by order management.
//!
//! `ORDER_CREATED` is produced here and consumed by billing, so it has no handler.

mod budget;
mod execution;

use std::sync::Arc;

use common::OrderId;
use domain::{OrderRepository, OrderService};
use messaging::{EventEnvelope, EventType, QueueClient, SagaEvent};

pub use budget::{BudgetApprovedHandler, BudgetRejectedHandler};
pub use execution::{ExecutionFinishedHandler, ExecutionStartedHandler};

use crate::dispatcher::DispatcherBuilder;
use crate::error::SagaError;

/// Registers every order-management handler on `builder`.
pub fn register_order_handlers<R, Q>(
    builder: DispatcherBuilder,
    service: Arc<OrderService<R, Q>>,
) -> DispatcherBuilder
where
    R: OrderRepository + 'static,
    Q: QueueClient + 'static,
{
    builder
        .register(
            EventType::BudgetApproved,
            BudgetApprovedHandler::new(service.clone()),
        )
        .register(
            EventType::BudgetRejected,
            BudgetRejectedHandler::new(service.clone()),
        )
        .register(EventType::ExecutionStarted, ExecutionStartedHandler)
        .register(
            EventType::ExecutionFinished,
            ExecutionFinishedHandler::new(service),
        )
}

/// The order an envelope is about.
fn target_order(envelope: &EventEnvelope<SagaEvent>) -> OrderId {
    OrderId::from(envelope.aggregate_id.as_str())
}

fn unexpected(expected: EventType, envelope: &EventEnvelope<SagaEvent>) -> SagaError {
    SagaError::UnexpectedEvent {
        expected,
        actual: envelope.payload.event_type(),
    }
}
