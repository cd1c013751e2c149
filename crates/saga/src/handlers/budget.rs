use std::sync::Arc;

use async_trait::async_trait;
use domain::{OrderRepository, OrderService};
use messaging::{EventEnvelope, EventType, QueueClient, SagaEvent};

use super::{target_order, unexpected};
use crate::Result;
use crate::handler::EventHandler;

/// `BUDGET_APPROVED`: the order starts executing.
pub struct BudgetApprovedHandler<R: OrderRepository, Q: QueueClient> {
    service: Arc<OrderService<R, Q>>,
}

impl<R: OrderRepository, Q: QueueClient> BudgetApprovedHandler<R, Q> {
    pub fn new(service: Arc<OrderService<R, Q>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<R: OrderRepository, Q: QueueClient> EventHandler for BudgetApprovedHandler<R, Q> {
    fn name(&self) -> &'static str {
        "budget_approved"
    }

    async fn handle(&self, envelope: &EventEnvelope<SagaEvent>) -> Result<()> {
        let SagaEvent::BudgetApproved(payload) = &envelope.payload else {
            return Err(unexpected(EventType::BudgetApproved, envelope));
        };
        let order_id = target_order(envelope);

        match self.service.approve_budget(&order_id).await {
            Ok(update) => {
                tracing::info!(
                    %order_id,
                    budget_id = payload.budget_id.as_deref(),
                    payment_id = payload.payment_id.as_deref(),
                    status = %update.order.status(),
                    "budget approved, order executing"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "failed to approve budget");
                Err(e.into())
            }
        }
    }
}

/// `BUDGET_REJECTED`: the order is canceled.
pub struct BudgetRejectedHandler<R: OrderRepository, Q: QueueClient> {
    service: Arc<OrderService<R, Q>>,
}

impl<R: OrderRepository, Q: QueueClient> BudgetRejectedHandler<R, Q> {
    pub fn new(service: Arc<OrderService<R, Q>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<R: OrderRepository, Q: QueueClient> EventHandler for BudgetRejectedHandler<R, Q> {
    fn name(&self) -> &'static str {
        "budget_rejected"
    }

    async fn handle(&self, envelope: &EventEnvelope<SagaEvent>) -> Result<()> {
        let SagaEvent::BudgetRejected(payload) = &envelope.payload else {
            return Err(unexpected(EventType::BudgetRejected, envelope));
        };
        let order_id = target_order(envelope);

        match self.service.reject_budget(&order_id).await {
            Ok(_) => {
                tracing::info!(
                    %order_id,
                    budget_id = payload.budget_id.as_deref(),
                    reason = payload.reason.as_deref(),
                    "budget rejected, order canceled"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "failed to reject budget");
                Err(e.into())
            }
        }
    }
}
