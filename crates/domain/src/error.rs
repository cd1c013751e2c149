//! Domain error types.

use common::{OrderId, Version};
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during order use cases.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A business rule of the order aggregate was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// No order with this id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order was changed by someone else since it was loaded.
    #[error("Concurrency conflict on order {order_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Returns true for errors raised by the aggregate's own rules.
    pub fn is_business_rule_violation(&self) -> bool {
        matches!(self, DomainError::Order(_))
    }

    /// Returns true if retrying against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::ConcurrencyConflict { .. } | DomainError::Storage(_)
        )
    }
}
