//! Order use cases.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use common::{CustomerId, Money, OrderId, VehicleId};
use messaging::{EventPublisher, OrderCreatedPayload, QueueClient, SagaEvent};

use crate::error::DomainError;
use crate::metrics::OrderMetrics;
use crate::repository::OrderRepository;

use super::{Order, OrderError, OrderStatus};

/// Result of a mutating use case.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    /// The order as saved, carrying its new version.
    pub order: Order,

    /// Status before the mutation.
    pub previous_status: OrderStatus,

    /// How long the order had been in `previous_status` when the mutation ran.
    pub time_in_previous_status: TimeDelta,
}

impl OrderUpdate {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.order.status()
    }

    pub fn time_in_previous_status_minutes(&self) -> f64 {
        self.time_in_previous_status.num_milliseconds() as f64 / 60_000.0
    }
}

/// Use cases over the order aggregate.
///
/// Each mutating use case loads the order, applies one aggregate method and
/// saves it with a version check, so a concurrent writer surfaces as
/// [`DomainError::ConcurrencyConflict`] instead of a lost update.
pub struct OrderService<R: OrderRepository, Q: QueueClient> {
    repository: R,
    publisher: EventPublisher<Q>,
    metrics: Arc<dyn OrderMetrics>,
    billing_queues: Vec<String>,
}

impl<R: OrderRepository, Q: QueueClient> OrderService<R, Q> {
    /// Creates a new order service.
    pub fn new(repository: R, publisher: EventPublisher<Q>, metrics: Arc<dyn OrderMetrics>) -> Self {
        Self {
            repository,
            publisher,
            metrics,
            billing_queues: Vec::new(),
        }
    }

    /// Adds a queue that also receives `ORDER_CREATED`. Empty URLs are ignored.
    pub fn with_billing_queue(mut self, queue_url: impl Into<String>) -> Self {
        let queue_url = queue_url.into();
        if !queue_url.is_empty() {
            self.billing_queues.push(queue_url);
        }
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn publisher(&self) -> &EventPublisher<Q> {
        &self.publisher
    }

    pub fn metrics(&self) -> &Arc<dyn OrderMetrics> {
        &self.metrics
    }

    /// Opens a new order and announces it to billing.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        customer_id: Option<CustomerId>,
        vehicle_id: Option<VehicleId>,
    ) -> Result<Order, DomainError> {
        let mut order = Order::create(customer_id, vehicle_id, Utc::now())?;
        let version = self.repository.save(&order).await?;
        order.set_version(version);

        self.metrics.record_order_created();
        tracing::info!(order_id = %order.id(), status = %order.status(), "order created");

        let payload = OrderCreatedPayload {
            order_id: order.id().clone(),
            customer_id: order.customer_id().cloned(),
            vehicle_id: order.vehicle_id().cloned(),
            status: OrderStatus::Received.as_str().to_string(),
            current_status: (order.status() != OrderStatus::Received)
                .then(|| order.status().as_str().to_string()),
            total_value: order.total_value(),
        };
        self.publisher
            .publish(
                order.id().as_str(),
                SagaEvent::OrderCreated(payload),
                &self.billing_queues,
            )
            .await;

        Ok(order)
    }

    /// Loads an order, failing if it does not exist.
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, DomainError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::OrderNotFound(id.clone()))
    }

    /// Lists all orders, most urgent first, then oldest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        let mut orders = self.repository.find_all().await?;
        orders.sort_by_key(|order| (order.status().priority(), order.created_at()));
        Ok(orders)
    }

    /// Lists orders in one status, oldest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, DomainError> {
        let mut orders = self.repository.find_by_status(status).await?;
        orders.sort_by_key(Order::created_at);
        Ok(orders)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_customer(
        &self,
        id: &OrderId,
        customer_id: CustomerId,
    ) -> Result<OrderUpdate, DomainError> {
        self.execute(id, |order, now| {
            order.set_customer(customer_id, now);
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_vehicle(
        &self,
        id: &OrderId,
        vehicle_id: VehicleId,
    ) -> Result<OrderUpdate, DomainError> {
        self.execute(id, |order, now| order.set_vehicle(vehicle_id, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_total_value(
        &self,
        id: &OrderId,
        amount: Money,
    ) -> Result<OrderUpdate, DomainError> {
        self.execute(id, |order, now| order.set_total_value(amount, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_status_manually(
        &self,
        id: &OrderId,
        target: OrderStatus,
    ) -> Result<OrderUpdate, DomainError> {
        self.execute(id, |order, now| order.update_status_manually(target, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn approve_budget(&self, id: &OrderId) -> Result<OrderUpdate, DomainError> {
        self.execute(id, |order, now| order.approve_budget(now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject_budget(&self, id: &OrderId) -> Result<OrderUpdate, DomainError> {
        self.execute(id, |order, now| order.reject_budget(now))
            .await
    }

    /// Deletes an order, failing if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: &OrderId) -> Result<(), DomainError> {
        if self.repository.delete(id).await? {
            tracing::info!(order_id = %id, "order deleted");
            Ok(())
        } else {
            Err(DomainError::OrderNotFound(id.clone()))
        }
    }

    /// Load, mutate, save with a version check.
    async fn execute<F>(&self, id: &OrderId, mutate: F) -> Result<OrderUpdate, DomainError>
    where
        F: FnOnce(&mut Order, DateTime<Utc>) -> Result<(), OrderError> + Send,
    {
        let mut order = self.get_order(id).await?;
        let now = Utc::now();
        let previous_status = order.status();
        let time_in_previous_status = order.time_in_status(now);

        mutate(&mut order, now)?;

        let version = self.repository.save(&order).await?;
        order.set_version(version);

        if order.status() != previous_status {
            tracing::info!(
                order_id = %id,
                from = %previous_status,
                to = %order.status(),
                "order status changed"
            );
        }

        Ok(OrderUpdate {
            order,
            previous_status,
            time_in_previous_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryOrderMetrics;
    use crate::repository::InMemoryOrderRepository;
    use common::Version;
    use messaging::{EventEnvelope, EventType, InMemoryQueue};

    const OUTBOUND: &str = "orders-outbound";
    const BILLING: &str = "billing-inbound";

    struct Fixture {
        service: OrderService<InMemoryOrderRepository, InMemoryQueue>,
        queue: InMemoryQueue,
        metrics: InMemoryOrderMetrics,
    }

    fn fixture() -> Fixture {
        let queue = InMemoryQueue::new();
        let metrics = InMemoryOrderMetrics::new();
        let service = OrderService::new(
            InMemoryOrderRepository::new(),
            EventPublisher::new(queue.clone(), OUTBOUND, "order-service"),
            Arc::new(metrics.clone()),
        )
        .with_billing_queue(BILLING);
        Fixture {
            service,
            queue,
            metrics,
        }
    }

    #[tokio::test]
    async fn test_create_order_publishes_to_outbound_and_billing() {
        let f = fixture();

        let order = f
            .service
            .create_order(Some(CustomerId::new("C1")), Some(VehicleId::new("V1")))
            .await
            .unwrap();

        assert_eq!(order.version(), Version::new(1));
        assert_eq!(order.status(), OrderStatus::Diagnosing);
        assert_eq!(f.metrics.orders_created(), 1);

        let bodies = f.queue.bodies(BILLING).await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(f.queue.bodies(OUTBOUND).await, bodies);

        let envelope = EventEnvelope::from_json(&bodies[0])
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(envelope.aggregate_id, order.id().as_str());
        assert_eq!(envelope.event_type, EventType::OrderCreated.as_str());
        let SagaEvent::OrderCreated(payload) = envelope.payload else {
            panic!("Expected OrderCreated payload");
        };
        assert_eq!(payload.status, "received");
        assert_eq!(payload.current_status.as_deref(), Some("diagnosing"));
        assert_eq!(payload.customer_id, Some(CustomerId::new("C1")));
        assert_eq!(payload.total_value, Money::zero());
    }

    #[tokio::test]
    async fn test_create_order_without_references_omits_current_status() {
        let f = fixture();

        f.service.create_order(None, None).await.unwrap();

        let bodies = f.queue.bodies(OUTBOUND).await;
        let raw: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(raw["payload"]["status"], "received");
        assert!(raw["payload"].get("currentStatus").is_none());
    }

    #[tokio::test]
    async fn test_create_order_survives_publish_failure() {
        let f = fixture();
        f.queue.set_unavailable(OUTBOUND, true).await;
        f.queue.set_unavailable(BILLING, true).await;

        let order = f.service.create_order(None, None).await.unwrap();

        assert_eq!(order.status(), OrderStatus::Received);
        assert!(f.service.get_order(order.id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_order_with_vehicle_only_is_rejected() {
        let f = fixture();

        let result = f
            .service
            .create_order(None, Some(VehicleId::new("V1")))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::VehicleRequiresCustomer))
        ));
        assert!(f.service.repository().is_empty().await);
        assert_eq!(f.queue.total_count(OUTBOUND).await, 0);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let f = fixture();
        let id = OrderId::from("os-missing");

        assert!(matches!(
            f.service.get_order(&id).await,
            Err(DomainError::OrderNotFound(_))
        ));
        assert!(matches!(
            f.service.approve_budget(&id).await,
            Err(DomainError::OrderNotFound(_))
        ));
        assert!(matches!(
            f.service.delete_order(&id).await,
            Err(DomainError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_use_cases_drive_lifecycle() {
        let f = fixture();
        let order = f
            .service
            .create_order(Some(CustomerId::new("C1")), None)
            .await
            .unwrap();
        let id = order.id().clone();

        let update = f
            .service
            .set_vehicle(&id, VehicleId::new("V1"))
            .await
            .unwrap();
        assert_eq!(update.previous_status, OrderStatus::Received);
        assert_eq!(update.order.status(), OrderStatus::Diagnosing);
        assert!(update.status_changed());

        let update = f
            .service
            .set_total_value(&id, Money::from_cents(20_000))
            .await
            .unwrap();
        assert_eq!(update.order.status(), OrderStatus::AwaitingApproval);

        let update = f.service.approve_budget(&id).await.unwrap();
        assert_eq!(update.order.status(), OrderStatus::Executing);
        assert!(update.order.execution().is_started());

        let update = f
            .service
            .update_status_manually(&id, OrderStatus::Finished)
            .await
            .unwrap();
        assert_eq!(update.previous_status, OrderStatus::Executing);
        assert!(matches!(
            update.order.execution_duration_days(),
            Some(0) | Some(1)
        ));
        assert!(update.time_in_previous_status >= TimeDelta::zero());
        assert_eq!(update.order.version(), Version::new(5));
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_not_saved() {
        let f = fixture();
        let order = f.service.create_order(None, None).await.unwrap();

        let result = f.service.reject_budget(order.id()).await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::BudgetNotAwaitingApproval { .. }))
        ));
        let stored = f.service.get_order(order.id()).await.unwrap();
        assert_eq!(stored.version(), Version::new(1));
        assert_eq!(stored.status(), OrderStatus::Received);
    }

    #[tokio::test]
    async fn test_list_orders_by_priority() {
        let f = fixture();
        let received = f.service.create_order(None, None).await.unwrap();
        let diagnosing = f
            .service
            .create_order(Some(CustomerId::new("C1")), Some(VehicleId::new("V1")))
            .await
            .unwrap();
        let executing = f
            .service
            .create_order(Some(CustomerId::new("C2")), Some(VehicleId::new("V2")))
            .await
            .unwrap();
        f.service
            .set_total_value(executing.id(), Money::from_cents(100))
            .await
            .unwrap();
        f.service.approve_budget(executing.id()).await.unwrap();

        let ids: Vec<OrderId> = f
            .service
            .list_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|order| order.id().clone())
            .collect();

        assert_eq!(
            ids,
            vec![
                executing.id().clone(),
                diagnosing.id().clone(),
                received.id().clone()
            ]
        );

        let diagnosing_only = f
            .service
            .list_by_status(OrderStatus::Diagnosing)
            .await
            .unwrap();
        assert_eq!(diagnosing_only.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_order() {
        let f = fixture();
        let order = f.service.create_order(None, None).await.unwrap();

        f.service.delete_order(order.id()).await.unwrap();

        assert!(matches!(
            f.service.get_order(order.id()).await,
            Err(DomainError::OrderNotFound(_))
        ));
    }
}
