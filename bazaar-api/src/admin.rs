use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use bazaar_core::{Order, PaymentStatus, TrackingStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, AdminClaims};
use crate::state::AppState;

const DEFAULT_PAGE: usize = 50;
const MAX_PAGE: usize = 500;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdateRequest {
    pub status: TrackingStatus,
    #[serde(default)]
    pub tracking_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminCancelRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentUpdateRequest {
    pub status: PaymentStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/orders", get(list_orders))
        .route("/v1/admin/orders/{id}/tracking", put(update_tracking))
        .route("/v1/admin/orders/{id}/cancel", post(cancel_order))
        .route("/v1/admin/orders/{id}/fulfillment", post(retry_fulfillment))
        .route("/v1/admin/orders/{id}/payment", put(update_payment))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/orders
async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let orders = state.orders.recent_orders(limit).await?;
    Ok(Json(orders))
}

/// PUT /v1/admin/orders/{id}/tracking
async fn update_tracking(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<TrackingUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    tracing::info!(admin = %claims.sub, order_id = %order_id, status = %req.status, "Admin tracking update");
    let order = state
        .orders
        .update_tracking(order_id, req.status, req.tracking_id)
        .await?;
    Ok(Json(order))
}

/// POST /v1/admin/orders/{id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<AdminCancelRequest>,
) -> Result<Json<Order>, AppError> {
    tracing::info!(admin = %claims.sub, order_id = %order_id, "Admin cancellation");
    let order = state.orders.cancel(order_id, &req.reason).await?;
    Ok(Json(order))
}

/// POST /v1/admin/orders/{id}/fulfillment
/// Re-attempts courier registration for an order that never got external ids.
async fn retry_fulfillment(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    tracing::info!(admin = %claims.sub, order_id = %order_id, "Admin fulfillment retry");
    let order = state.orders.retry_fulfillment(order_id).await?;
    Ok(Json(order))
}

/// PUT /v1/admin/orders/{id}/payment
async fn update_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<PaymentUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    tracing::info!(admin = %claims.sub, order_id = %order_id, status = %req.status, "Admin payment update");
    let order = state
        .orders
        .record_payment(order_id, req.status, req.reference)
        .await?;
    Ok(Json(order))
}
