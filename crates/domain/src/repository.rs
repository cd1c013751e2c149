//! Order storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CustomerId, OrderId, VehicleId, Version};
use tokio::sync::RwLock;

use crate::error::DomainError;
use crate::order::{Order, OrderStatus};

/// Storage for order aggregates.
///
/// `save` is a compare-and-swap on the order's version: it succeeds only if
/// the stored version still equals the version the order was loaded at (or
/// the order is new and absent), and returns the bumped version.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists an order, returning its new version.
    async fn save(&self, order: &Order) -> Result<Version, DomainError>;

    /// Loads an order by id.
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError>;

    /// Returns every order in the given status.
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, DomainError>;

    /// Returns every order of a customer.
    async fn find_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>, DomainError>;

    /// Returns every order for a vehicle.
    async fn find_by_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Order>, DomainError>;

    /// Returns all orders.
    async fn find_all(&self) -> Result<Vec<Order>, DomainError>;

    /// Removes an order. Returns false if it did not exist.
    async fn delete(&self, id: &OrderId) -> Result<bool, DomainError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    fail_on_save: bool,
}

/// In-memory order repository.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail with a storage error, or restores it.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Returns the number of stored orders.
    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns true if no orders are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn find_where<F>(&self, predicate: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool + Send,
    {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|order| predicate(order))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<Version, DomainError> {
        let mut state = self.state.write().await;

        if state.fail_on_save {
            return Err(DomainError::Storage("order store unavailable".to_string()));
        }

        let expected = order.version();
        let is_new = expected == Version::initial();
        let actual = match state.orders.get(order.id()) {
            Some(stored) => stored.version(),
            None if is_new => Version::initial(),
            // Loaded earlier, deleted since.
            None => return Err(DomainError::OrderNotFound(order.id().clone())),
        };

        if actual != expected {
            return Err(DomainError::ConcurrencyConflict {
                order_id: order.id().clone(),
                expected,
                actual,
            });
        }

        let new_version = expected.next();
        let mut stored = order.clone();
        stored.set_version(new_version);
        state.orders.insert(stored.id().clone(), stored);

        Ok(new_version)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.state.read().await.orders.get(id).cloned())
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, DomainError> {
        Ok(self.find_where(|order| order.status() == status).await)
    }

    async fn find_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .find_where(|order| order.customer_id() == Some(customer_id))
            .await)
    }

    async fn find_by_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .find_where(|order| order.vehicle_id() == Some(vehicle_id))
            .await)
    }

    async fn find_all(&self) -> Result<Vec<Order>, DomainError> {
        Ok(self.find_where(|_| true).await)
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, DomainError> {
        Ok(self.state.write().await.orders.remove(id).is_some())
    }
}
