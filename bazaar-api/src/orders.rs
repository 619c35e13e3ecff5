use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bazaar_core::{LineItem, Order, OrderDraft, PaymentMethod};
use bazaar_order::pricing::cart_total;
use bazaar_order::{CheckoutStarted, PriceBreakdown, SyncOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub cart_total: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetOrderQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub outcome: SyncOutcome,
    pub order: Order,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/checkout/quote", post(quote))
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/sync", post(sync_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/checkout/quote
async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let total = cart_total(&req.items);
    let breakdown = state.pricing.quote(total, req.payment_method)?;

    Ok(Json(QuoteResponse {
        cart_total: total,
        payment_method: req.payment_method,
        breakdown,
    }))
}

/// POST /v1/orders
/// Cash-on-delivery checkout. The order is created immediately as `pending`.
async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    match state.checkout.begin(PaymentMethod::Cod, draft).await? {
        CheckoutStarted::Placed { order } => Ok((StatusCode::CREATED, Json(*order))),
        CheckoutStarted::AwaitingPayment { .. } => Err(AppError::InternalServerError(
            "cash on delivery unexpectedly asked for payment".to_string(),
        )),
    }
}

/// GET /v1/orders?user_id=
async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.orders.list_orders(&query.user_id).await?;
    Ok(Json(orders))
}

/// GET /v1/orders/{id}
/// `?refresh=true` asks the courier for fresh status first; a courier outage
/// still returns the stored order.
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<GetOrderQuery>,
) -> Result<Json<Order>, AppError> {
    if query.refresh {
        if let Err(e) = state.reconciler.sync_order(order_id).await {
            tracing::warn!(order_id = %order_id, error = %e, "Refresh before read failed");
        }
    }
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.cancel(order_id, &req.reason).await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/sync
async fn sync_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<SyncResponse>, AppError> {
    let outcome = state.reconciler.sync_order(order_id).await?;
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(SyncResponse { outcome, order }))
}
