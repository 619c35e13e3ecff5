use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{PaymentMethod, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway unreachable: {0}")]
    GatewayUnreachable(String),

    #[error("Payment signature verification failed")]
    SignatureMismatch,

    #[error("Payment is still being processed")]
    Pending,

    #[error("Payment was cancelled")]
    Cancelled,

    #[error("Payment failed: {0}")]
    Declined(String),

    #[error("Unknown or already completed payment reference: {0}")]
    UnknownReference(String),

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Payment method '{0}' takes no completion signal")]
    NotApplicable(PaymentMethod),
}

impl PaymentError {
    /// Whether the customer should be told to simply try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PaymentError::NotApplicable(_) | PaymentError::InvalidAmount(_)
        )
    }
}

/// Everything an adapter needs to start collecting money for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Idempotent per attempt; doubles as the merchant transaction id.
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer_name: String,
    pub customer_mobile: String,
    pub user_id: Option<String>,
}

/// Parameters the browser needs to open the hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutParams {
    pub key_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
    pub prefill_name: String,
    pub prefill_contact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentInitiation {
    /// No external flow; settlement happens later (e.g. on delivery).
    Settled { status: PaymentStatus },
    Checkout(CheckoutParams),
    Redirect { url: String, reference: String },
}

/// Completion signal delivered out of band, after the customer returns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionSignal {
    Success {
        payment_id: String,
        #[serde(default)]
        signature: Option<String>,
    },
    Cancelled,
    Failed { reason: String },
}

/// What an adapter remembers about an attempt between initiation and completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayment {
    pub reference: String,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// Gateway-side payment/transaction id stored on the order.
    pub payment_reference: String,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, PaymentError>;

    /// Confirm a completion signal. `Cancelled`/`Failed` signals must come
    /// back as errors so no order is created.
    async fn complete(
        &self,
        pending: &PendingPayment,
        signal: CompletionSignal,
    ) -> Result<PaymentOutcome, PaymentError>;
}

/// Amount in minor currency units (paise), rejecting fractions of a paisa.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    let minor = amount * Decimal::ONE_HUNDRED;
    if minor.fract() != Decimal::ZERO || minor <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(amount));
    }
    minor.to_i64().ok_or(PaymentError::InvalidAmount(amount))
}
