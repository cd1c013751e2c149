//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Money;
use domain::InMemoryOrderRepository;
use messaging::{BudgetApprovedPayload, EventEnvelope, InMemoryQueue, QueueClient, SagaEvent};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::ProcessOutcome;
use tower::ServiceExt;

use api::config::Config;
use api::routes::orders::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn test_config() -> Config {
    Config {
        outbound_queue_url: "orders-outbound".to_string(),
        billing_queue_url: "billing-inbound".to_string(),
        ..Config::default()
    }
}

fn setup() -> axum::Router {
    let (app, _, _) = setup_with_state();
    app
}

fn setup_with_state() -> (
    axum::Router,
    Arc<AppState<InMemoryOrderRepository, InMemoryQueue>>,
    InMemoryQueue,
) {
    let queue = InMemoryQueue::new();
    let state = api::create_default_state(queue.clone(), &test_config());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state, queue)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_order(app: &axum::Router, body: serde_json::Value) -> String {
    let (status, json) = send(app, "POST", "/orders", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

/// Creates an order and walks it to `awaiting_approval` with a 250.00 budget.
async fn order_awaiting_approval(app: &axum::Router) -> String {
    let id = create_order(
        app,
        serde_json::json!({ "customer_id": "C1", "vehicle_id": "V1" }),
    )
    .await;
    let (status, _) = send(
        app,
        "PUT",
        &format!("/orders/{id}/total"),
        Some(serde_json::json!({ "total_value_cents": 25_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_empty_order() {
    let app = setup();

    let (status, json) = send(&app, "POST", "/orders", Some(serde_json::json!({}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "received");
    assert_eq!(json["total_value_cents"], 0);
    assert!(json["customer_id"].is_null());
    assert!(json["execution_started_at"].is_null());
}

#[tokio::test]
async fn test_create_with_customer_and_vehicle_starts_diagnosing() {
    let app = setup();

    let id = create_order(
        &app,
        serde_json::json!({ "customer_id": "C1", "vehicle_id": "V1" }),
    )
    .await;
    let (status, json) = send(&app, "GET", &format!("/orders/{id}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["status"], "diagnosing");
    assert_eq!(json["customer_id"], "C1");
    assert_eq!(json["vehicle_id"], "V1");
}

#[tokio::test]
async fn test_create_vehicle_without_customer_is_conflict() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(serde_json::json!({ "vehicle_id": "V1" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_create_publishes_order_created() {
    let (app, _, queue) = setup_with_state();

    let id = create_order(&app, serde_json::json!({ "customer_id": "C1" })).await;

    assert_eq!(queue.total_count("orders-outbound").await, 1);
    assert_eq!(queue.total_count("billing-inbound").await, 1);

    let body = &queue.bodies("orders-outbound").await[0];
    let envelope = EventEnvelope::from_json(body).unwrap();
    assert_eq!(envelope.event_type, "ORDER_CREATED");
    assert_eq!(envelope.aggregate_id, id);
    assert_eq!(envelope.source, "order-service");
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/orders/does-not-exist", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_full_lifecycle_over_rest() {
    let app = setup();

    let id = create_order(&app, serde_json::json!({})).await;

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/customer"),
        Some(serde_json::json!({ "customer_id": "C1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "received");

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/vehicle"),
        Some(serde_json::json!({ "vehicle_id": "V1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "diagnosing");
    assert_eq!(json["previous_status"], "received");

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/total"),
        Some(serde_json::json!({ "total_value_cents": 25_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "awaiting_approval");
    assert_eq!(json["total_value_cents"], 25_000);

    let (status, json) = send(&app, "POST", &format!("/orders/{id}/budget/approve"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "executing");
    assert!(json["execution_started_at"].is_string());

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "finished" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "finished");
    assert!(json["execution_finished_at"].is_string());
    assert!(matches!(json["execution_duration_days"].as_i64(), Some(0) | Some(1)));

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "delivered");
    assert_eq!(json["previous_status"], "finished");
}

#[tokio::test]
async fn test_reject_budget_cancels() {
    let app = setup();
    let id = order_awaiting_approval(&app).await;

    let (status, json) = send(&app, "POST", &format!("/orders/{id}/budget/reject"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "canceled");
    assert_eq!(json["previous_status"], "awaiting_approval");
}

#[tokio::test]
async fn test_invalid_transition_is_conflict() {
    let app = setup();
    let id = create_order(&app, serde_json::json!({})).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "finished" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = send(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(json["status"], "received");
}

#[tokio::test]
async fn test_approve_outside_approval_is_conflict() {
    let app = setup();
    let id = create_order(&app, serde_json::json!({})).await;

    let (status, _) = send(&app, "POST", &format!("/orders/{id}/budget/approve"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_negative_total_is_conflict() {
    let app = setup();
    let id = create_order(&app, serde_json::json!({})).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/total"),
        Some(serde_json::json!({ "total_value_cents": -1 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_status_is_bad_request() {
    let app = setup();
    let id = create_order(&app, serde_json::json!({})).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(serde_json::json!({ "status": "flying" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/orders?status=flying", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_customer_is_bad_request() {
    let app = setup();
    let id = create_order(&app, serde_json::json!({})).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/customer"),
        Some(serde_json::json!({ "customer_id": "  " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_by_priority_and_status() {
    let app = setup();

    let received = create_order(&app, serde_json::json!({})).await;
    let diagnosing = create_order(
        &app,
        serde_json::json!({ "customer_id": "C1", "vehicle_id": "V1" }),
    )
    .await;
    let awaiting = order_awaiting_approval(&app).await;

    let (status, json) = send(&app, "GET", "/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![awaiting.as_str(), diagnosing.as_str(), received.as_str()]);

    let (status, json) = send(&app, "GET", "/orders?status=diagnosing", None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], diagnosing.as_str());
}

#[tokio::test]
async fn test_delete_order() {
    let app = setup();
    let id = create_order(&app, serde_json::json!({})).await;

    let (status, _) = send(&app, "DELETE", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_consumer_applies_inbound_events() {
    let (app, state, queue) = setup_with_state();
    let config = test_config();
    let consumer = api::create_consumer(&state, queue.clone(), &config);
    let id = order_awaiting_approval(&app).await;

    let event = SagaEvent::BudgetApproved(BudgetApprovedPayload {
        order_id: id.as_str().into(),
        budget_id: Some("b-1".to_string()),
        total_value: Some(Money::from_cents(25_000)),
        payment_id: None,
        payment_status: None,
    });
    let body = EventEnvelope::new(event, id.clone(), "billing-service")
        .to_json()
        .unwrap();
    queue.send(&config.inbound_queue_url, &body).await.unwrap();

    let outcomes = consumer.poll_once().await.unwrap();
    assert_eq!(outcomes, vec![ProcessOutcome::Acknowledged]);

    let (_, json) = send(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(json["status"], "executing");
    assert_eq!(queue.total_count(&config.inbound_queue_url).await, 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    create_order(&app, serde_json::json!({})).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
