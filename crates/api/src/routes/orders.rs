//! Service order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, VehicleId};
use domain::{Order, OrderRepository, OrderService, OrderStatus, OrderUpdate};
use messaging::QueueClient;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R: OrderRepository, Q: QueueClient> {
    pub order_service: Arc<OrderService<R, Q>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SetCustomerRequest {
    pub customer_id: String,
}

#[derive(Deserialize)]
pub struct SetVehicleRequest {
    pub vehicle_id: String,
}

#[derive(Deserialize)]
pub struct SetTotalRequest {
    pub total_value_cents: i64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: OrderStatus,
    pub total_value_cents: i64,
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub execution_started_at: Option<DateTime<Utc>>,
    pub execution_finished_at: Option<DateTime<Utc>>,
    pub execution_duration_days: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            status: order.status(),
            total_value_cents: order.total_value().cents(),
            customer_id: order.customer_id().map(ToString::to_string),
            vehicle_id: order.vehicle_id().map(ToString::to_string),
            execution_started_at: order.execution().started_at(),
            execution_finished_at: order.execution().finished_at(),
            execution_duration_days: order.execution_duration_days(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            version: order.version().as_i64(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderUpdateResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub previous_status: OrderStatus,
}

impl From<OrderUpdate> for OrderUpdateResponse {
    fn from(update: OrderUpdate) -> Self {
        Self {
            order: OrderResponse::from(&update.order),
            previous_status: update.previous_status,
        }
    }
}

// -- Handlers --

/// POST /orders — open a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let customer_id = non_empty(req.customer_id).map(CustomerId::new);
    let vehicle_id = non_empty(req.vehicle_id).map(VehicleId::new);

    let order = state
        .order_service
        .create_order(customer_id, vehicle_id)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders — list orders by priority, optionally filtered by `?status=`.
#[tracing::instrument(skip(state, params))]
pub async fn list<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = match params.status {
        Some(status) => {
            let status = parse_status(&status)?;
            state.order_service.list_by_status(status).await?
        }
        None => state.order_service.list_orders().await?,
    };

    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id} — load one order.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.order_service.get_order(&OrderId::from(id)).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.order_service.delete_order(&OrderId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /orders/{id}/customer
#[tracing::instrument(skip(state, req))]
pub async fn set_customer<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
    Json(req): Json<SetCustomerRequest>,
) -> Result<Json<OrderUpdateResponse>, ApiError> {
    let customer_id = required(req.customer_id, "customer_id")?;
    let update = state
        .order_service
        .set_customer(&OrderId::from(id), CustomerId::new(customer_id))
        .await?;
    Ok(Json(update.into()))
}

/// PUT /orders/{id}/vehicle
#[tracing::instrument(skip(state, req))]
pub async fn set_vehicle<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
    Json(req): Json<SetVehicleRequest>,
) -> Result<Json<OrderUpdateResponse>, ApiError> {
    let vehicle_id = required(req.vehicle_id, "vehicle_id")?;
    let update = state
        .order_service
        .set_vehicle(&OrderId::from(id), VehicleId::new(vehicle_id))
        .await?;
    Ok(Json(update.into()))
}

/// PUT /orders/{id}/total
#[tracing::instrument(skip(state, req))]
pub async fn set_total<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
    Json(req): Json<SetTotalRequest>,
) -> Result<Json<OrderUpdateResponse>, ApiError> {
    let update = state
        .order_service
        .set_total_value(&OrderId::from(id), Money::from_cents(req.total_value_cents))
        .await?;
    Ok(Json(update.into()))
}

/// PUT /orders/{id}/status — request a manual transition.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderUpdateResponse>, ApiError> {
    let target = parse_status(&req.status)?;
    let update = state
        .order_service
        .update_status_manually(&OrderId::from(id), target)
        .await?;
    Ok(Json(update.into()))
}

/// POST /orders/{id}/budget/approve
#[tracing::instrument(skip(state))]
pub async fn approve_budget<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderUpdateResponse>, ApiError> {
    let update = state
        .order_service
        .approve_budget(&OrderId::from(id))
        .await?;
    Ok(Json(update.into()))
}

/// POST /orders/{id}/budget/reject
#[tracing::instrument(skip(state))]
pub async fn reject_budget<R: OrderRepository + 'static, Q: QueueClient + 'static>(
    State(state): State<Arc<AppState<R, Q>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderUpdateResponse>, ApiError> {
    let update = state
        .order_service
        .reject_budget(&OrderId::from(id))
        .await?;
    Ok(Json(update.into()))
}

// -- Helpers --

fn parse_status(value: &str) -> Result<OrderStatus, ApiError> {
    value.parse().map_err(ApiError::BadRequest)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(value: String, field: &str) -> Result<String, ApiError> {
    non_empty(Some(value)).ok_or_else(|| ApiError::BadRequest(format!("{field} must not be empty")))
}
