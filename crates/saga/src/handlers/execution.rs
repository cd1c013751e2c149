use std::sync::Arc;

use async_trait::async_trait;
use domain::{OrderRepository, OrderService, OrderStatus};
use messaging::{EventEnvelope, EventType, QueueClient, SagaEvent};

use super::{target_order, unexpected};
use crate::Result;
use crate::handler::EventHandler;

/// `EXECUTION_STARTED`: logged only, the order is already executing since budget approval.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionStartedHandler;

#[async_trait]
impl EventHandler for ExecutionStartedHandler {
    fn name(&self) -> &'static str {
        "execution_started"
    }

    async fn handle(&self, envelope: &EventEnvelope<SagaEvent>) -> Result<()> {
        let SagaEvent::ExecutionStarted(payload) = &envelope.payload else {
            return Err(unexpected(EventType::ExecutionStarted, envelope));
        };

        tracing::info!(
            order_id = %target_order(envelope),
            execution_id = payload.execution_id.as_deref(),
            started_at = ?payload.started_at,
            "execution started"
        );
        Ok(())
    }
}

/// `EXECUTION_FINISHED`: the order is finished and its time in execution recorded.
pub struct ExecutionFinishedHandler<R: OrderRepository, Q: QueueClient> {
    service: Arc<OrderService<R, Q>>,
}

impl<R: OrderRepository, Q: QueueClient> ExecutionFinishedHandler<R, Q> {
    pub fn new(service: Arc<OrderService<R, Q>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<R: OrderRepository, Q: QueueClient> EventHandler for ExecutionFinishedHandler<R, Q> {
    fn name(&self) -> &'static str {
        "execution_finished"
    }

    async fn handle(&self, envelope: &EventEnvelope<SagaEvent>) -> Result<()> {
        let SagaEvent::ExecutionFinished(payload) = &envelope.payload else {
            return Err(unexpected(EventType::ExecutionFinished, envelope));
        };
        let order_id = target_order(envelope);

        let update = match self
            .service
            .update_status_manually(&order_id, OrderStatus::Finished)
            .await
        {
            Ok(update) => update,
            Err(e) => {
                tracing::error!(%order_id, error = %e, "failed to finish order");
                return Err(e.into());
            }
        };

        let metrics = self.service.metrics();
        metrics.record_time_in_status(
            update.previous_status,
            update.time_in_previous_status_minutes(),
        );
        metrics.record_status_change(update.previous_status, update.order.status());

        tracing::info!(
            %order_id,
            execution_id = payload.execution_id.as_deref(),
            duration_days = update.order.execution_duration_days(),
            reported_duration_days = payload.duration_days,
            "execution finished"
        );
        Ok(())
    }
}
