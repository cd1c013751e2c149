//! Order management service: REST surface and saga consumer wiring.
//!
//! Provides REST endpoints over the order use cases, and builds the queue
//! consumer that applies billing and production events to the same orders,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{InMemoryOrderRepository, OrderRepository, OrderService, PrometheusOrderMetrics};
use messaging::{EventPublisher, QueueClient};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{ConsumerSettings, DispatcherBuilder, QueueConsumer, register_order_handlers};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R, Q>(state: Arc<AppState<R, Q>>, metrics_handle: PrometheusHandle) -> Router
where
    R: OrderRepository + 'static,
    Q: QueueClient + 'static,
{
    use routes::orders;

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(orders::create::<R, Q>).get(orders::list::<R, Q>),
        )
        .route(
            "/orders/{id}",
            get(orders::get::<R, Q>).delete(orders::delete::<R, Q>),
        )
        .route("/orders/{id}/customer", put(orders::set_customer::<R, Q>))
        .route("/orders/{id}/vehicle", put(orders::set_vehicle::<R, Q>))
        .route("/orders/{id}/total", put(orders::set_total::<R, Q>))
        .route("/orders/{id}/status", put(orders::update_status::<R, Q>))
        .route(
            "/orders/{id}/budget/approve",
            post(orders::approve_budget::<R, Q>),
        )
        .route(
            "/orders/{id}/budget/reject",
            post(orders::reject_budget::<R, Q>),
        )
        .with_state(state)
        .merge(routes::metrics::router(metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over an in-memory order store.
///
/// `ORDER_CREATED` goes to the configured outbound queue and, when set, the
/// billing queue.
pub fn create_default_state<Q: QueueClient>(
    queue: Q,
    config: &Config,
) -> Arc<AppState<InMemoryOrderRepository, Q>> {
    let publisher = EventPublisher::new(
        queue,
        config.outbound_queue_url.as_str(),
        config.service_name.as_str(),
    );
    if !publisher.is_enabled() {
        tracing::warn!("OUTBOUND_QUEUE_URL not set, events will not be published");
    }

    let order_service = OrderService::new(
        InMemoryOrderRepository::new(),
        publisher,
        Arc::new(PrometheusOrderMetrics),
    )
    .with_billing_queue(config.billing_queue_url.as_str());

    Arc::new(AppState {
        order_service: Arc::new(order_service),
    })
}

/// Builds the consumer for the inbound queue with every order handler registered.
pub fn create_consumer<R, Q, C>(
    state: &AppState<R, Q>,
    queue: C,
    config: &Config,
) -> QueueConsumer<C>
where
    R: OrderRepository + 'static,
    Q: QueueClient + 'static,
    C: QueueClient,
{
    let dispatcher = register_order_handlers(
        DispatcherBuilder::new(),
        state.order_service.clone(),
    )
    .build(queue, config.inbound_queue_url.as_str());

    QueueConsumer::new(Arc::new(dispatcher), ConsumerSettings::default())
}
