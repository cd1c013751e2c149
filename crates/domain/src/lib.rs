//! Service order lifecycle engine.
//!
//! This crate provides:
//! - [`OrderStatus`] with its manual allow-list and automatic transitions
//! - [`ExecutionPeriod`] tracking the repair work window
//! - the [`Order`] aggregate tying both together
//! - [`OrderRepository`] with optimistic concurrency, and an in-memory implementation
//! - [`OrderMetrics`] sinks
//! - [`OrderService`] use cases

pub mod error;
pub mod metrics;
pub mod order;
pub mod repository;

pub use error::DomainError;
pub use metrics::{InMemoryOrderMetrics, NoopOrderMetrics, OrderMetrics, PrometheusOrderMetrics};
pub use order::{ExecutionPeriod, Order, OrderError, OrderService, OrderStatus, OrderUpdate};
pub use repository::{InMemoryOrderRepository, OrderRepository};
