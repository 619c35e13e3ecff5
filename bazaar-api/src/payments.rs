use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bazaar_core::payment::CompletionSignal;
use bazaar_core::{Order, OrderDraft, PaymentMethod};
use bazaar_order::CheckoutStarted;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Hosted checkout callback forwarded by the browser.
#[derive(Debug, Deserialize)]
pub struct OnlineCompleteRequest {
    pub reference: String,
    #[serde(flatten)]
    pub signal: CompletionSignal,
}

/// The customer lands back on the storefront; the gateway's status endpoint
/// is the only authority on whether money moved.
#[derive(Debug, Deserialize)]
pub struct RedirectCompleteRequest {
    pub reference: String,
    #[serde(default)]
    pub cancelled: bool,
}

impl RedirectCompleteRequest {
    fn into_signal(self) -> (String, CompletionSignal) {
        let signal = if self.cancelled {
            CompletionSignal::Cancelled
        } else {
            CompletionSignal::Success {
                payment_id: self.reference.clone(),
                signature: None,
            }
        };
        (self.reference, signal)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/online", post(begin_online))
        .route("/v1/payments/online/complete", post(complete_online))
        .route("/v1/payments/redirect", post(begin_redirect))
        .route("/v1/payments/redirect/complete", post(complete_redirect))
}

async fn begin(
    state: &AppState,
    method: PaymentMethod,
    draft: OrderDraft,
) -> Result<(StatusCode, Json<CheckoutStarted>), AppError> {
    if !state.checkout.supports(method) {
        return Err(AppError::ValidationError(format!(
            "payment method '{}' is not enabled",
            method
        )));
    }
    let started = state.checkout.begin(method, draft).await?;
    let status = match started {
        CheckoutStarted::Placed { .. } => StatusCode::CREATED,
        CheckoutStarted::AwaitingPayment { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(started)))
}

/// POST /v1/payments/online
/// Parks the checkout and returns the parameters for the hosted widget.
async fn begin_online(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<CheckoutStarted>), AppError> {
    begin(&state, PaymentMethod::Online, draft).await
}

/// POST /v1/payments/online/complete
async fn complete_online(
    State(state): State<AppState>,
    Json(req): Json<OnlineCompleteRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.checkout.complete(&req.reference, req.signal).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /v1/payments/redirect
async fn begin_redirect(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<CheckoutStarted>), AppError> {
    begin(&state, PaymentMethod::Redirect, draft).await
}

/// POST /v1/payments/redirect/complete
async fn complete_redirect(
    State(state): State<AppState>,
    Json(req): Json<RedirectCompleteRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let (reference, signal) = req.into_signal();
    let order = state.checkout.complete(&reference, signal).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
