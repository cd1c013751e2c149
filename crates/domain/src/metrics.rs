//! Order lifecycle metrics.

use std::sync::{Arc, PoisonError, RwLock};

use crate::order::OrderStatus;

/// Sink for order lifecycle metrics.
///
/// Recording is fire-and-forget: implementations must never fail or block the caller.
pub trait OrderMetrics: Send + Sync {
    /// Counts a newly created order.
    fn record_order_created(&self);

    /// Records how long an order stayed in `status` before leaving it.
    fn record_time_in_status(&self, status: OrderStatus, minutes: f64);

    /// Counts a status change.
    fn record_status_change(&self, from: OrderStatus, to: OrderStatus);
}

/// Records order metrics through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusOrderMetrics;

impl OrderMetrics for PrometheusOrderMetrics {
    fn record_order_created(&self) {
        metrics::counter!("orders_created_total").increment(1);
    }

    fn record_time_in_status(&self, status: OrderStatus, minutes: f64) {
        metrics::histogram!("order_time_in_status_minutes", "status" => status.as_str())
            .record(minutes);
    }

    fn record_status_change(&self, from: OrderStatus, to: OrderStatus) {
        metrics::counter!(
            "order_status_changes_total",
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOrderMetrics;

impl OrderMetrics for NoopOrderMetrics {
    fn record_order_created(&self) {}

    fn record_time_in_status(&self, _status: OrderStatus, _minutes: f64) {}

    fn record_status_change(&self, _from: OrderStatus, _to: OrderStatus) {}
}

#[derive(Debug, Default)]
struct InMemoryMetricsState {
    orders_created: u64,
    time_in_status: Vec<(OrderStatus, f64)>,
    status_changes: Vec<(OrderStatus, OrderStatus)>,
}

/// In-memory metrics for testing.
///
/// Cloning shares the recorded values.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderMetrics {
    state: Arc<RwLock<InMemoryMetricsState>>,
}

impl InMemoryOrderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_created(&self) -> u64 {
        self.read(|state| state.orders_created)
    }

    pub fn time_in_status(&self) -> Vec<(OrderStatus, f64)> {
        self.read(|state| state.time_in_status.clone())
    }

    pub fn status_changes(&self) -> Vec<(OrderStatus, OrderStatus)> {
        self.read(|state| state.status_changes.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&InMemoryMetricsState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, f: impl FnOnce(&mut InMemoryMetricsState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl OrderMetrics for InMemoryOrderMetrics {
    fn record_order_created(&self) {
        self.write(|state| state.orders_created += 1);
    }

    fn record_time_in_status(&self, status: OrderStatus, minutes: f64) {
        self.write(|state| state.time_in_status.push((status, minutes)));
    }

    fn record_status_change(&self, from: OrderStatus, to: OrderStatus) {
        self.write(|state| state.status_changes.push((from, to)));
    }
}
