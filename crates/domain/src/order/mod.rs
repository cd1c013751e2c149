//! Service order aggregate and related types.

mod aggregate;
mod execution;
mod service;
mod status;

pub use aggregate::Order;
pub use execution::ExecutionPeriod;
pub use service::{OrderService, OrderUpdate};
pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Business rule violations raised by the order aggregate.
///
/// Every variant is raised synchronously by an [`Order`] or [`OrderStatus`]
/// method and leaves the order unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested manual transition is not in the allow-list.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// An automatic transition fired from the wrong status.
    #[error("Cannot transition automatically from {from} to {to}")]
    AutomaticTransition { from: OrderStatus, to: OrderStatus },

    /// A vehicle was given to an order that has no customer.
    #[error("A vehicle requires a customer to be set first")]
    VehicleRequiresCustomer,

    /// Total value below zero.
    #[error("Invalid total value: {cents} cents (must not be negative)")]
    NegativeTotalValue { cents: i64 },

    /// Budget decision on an order that is not awaiting approval.
    #[error("Cannot {action} while order is {current}")]
    BudgetNotAwaitingApproval {
        action: &'static str,
        current: OrderStatus,
    },

    /// Finishing an execution period that never started.
    #[error("Execution has not been started")]
    ExecutionNotStarted,

    /// Finishing or restarting an execution period that is already finished.
    #[error("Execution is already finished")]
    ExecutionAlreadyFinished,

    /// Finish timestamp earlier than the start timestamp.
    #[error("Execution cannot finish at {finished_at} before it started at {started_at}")]
    FinishBeforeStart {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}
