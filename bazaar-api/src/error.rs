use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bazaar_core::PaymentError;
use bazaar_order::pricing::PricingError;
use bazaar_order::OrderError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    /// `code` tells clients which rule was broken.
    ConflictError { code: &'static str, message: String },
    PaymentError { message: String, retryable: bool },
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn parts(self) -> (StatusCode, &'static str, String, Option<bool>) {
        match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::ConflictError { code, message } => (StatusCode::CONFLICT, code, message, None),
            AppError::PaymentError { message, retryable } => {
                (StatusCode::PAYMENT_REQUIRED, "PAYMENT_FAILED", message, Some(retryable))
            }
            AppError::UpstreamError(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", msg, Some(true))
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal Server Error".to_string(), None)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal Server Error".to_string(), None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message, retryable) = self.parts();

        let mut body = json!({
            "error": error_message,
            "code": code,
        });
        if let Some(retryable) = retryable {
            body["retryable"] = json!(retryable);
        }

        (status, Json(body)).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            OrderError::Validation(_) => AppError::ValidationError(err.to_string()),
            OrderError::IllegalTransition(rule) => AppError::ConflictError {
                code: rule.code(),
                message: rule.to_string(),
            },
            OrderError::Conflict(_) => AppError::ConflictError {
                code: "CONFLICT",
                message: err.to_string(),
            },
            OrderError::Payment(payment) => payment.into(),
            OrderError::Fulfillment(msg) => AppError::UpstreamError(msg),
            OrderError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::GatewayUnreachable(_) => AppError::UpstreamError(err.to_string()),
            PaymentError::UnknownReference(_) => AppError::NotFoundError(err.to_string()),
            PaymentError::InvalidAmount(_) | PaymentError::NotApplicable(_) => {
                AppError::ValidationError(err.to_string())
            }
            other => AppError::PaymentError {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}
