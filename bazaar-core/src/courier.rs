use async_trait::async_trait;

use crate::order::{Order, ShipmentRef};

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("Courier API unreachable: {0}")]
    Unreachable(String),

    #[error("Courier rejected credentials after re-login")]
    Unauthorized,

    #[error("Courier returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed courier response: {0}")]
    MalformedResponse(String),

    #[error("Courier integration is not configured")]
    Disabled,
}

/// External courier/logistics service.
#[async_trait]
pub trait FulfillmentClient: Send + Sync {
    /// Register the order with the courier and return its identifiers.
    async fn create_shipment(&self, order: &Order) -> Result<ShipmentRef, FulfillmentError>;

    /// Latest courier status string for an AWB, `None` when the courier has
    /// nothing to report yet.
    async fn get_tracking(&self, awb_code: &str) -> Result<Option<String>, FulfillmentError>;

    async fn cancel_shipment(&self, fulfillment_order_id: &str) -> Result<(), FulfillmentError>;
}

/// Stand-in used when no courier credentials are configured. Every call fails
/// with `Disabled`, which the pipeline absorbs like any other courier outage.
pub struct DisabledCourier;

#[async_trait]
impl FulfillmentClient for DisabledCourier {
    async fn create_shipment(&self, _order: &Order) -> Result<ShipmentRef, FulfillmentError> {
        Err(FulfillmentError::Disabled)
    }

    async fn get_tracking(&self, _awb_code: &str) -> Result<Option<String>, FulfillmentError> {
        Err(FulfillmentError::Disabled)
    }

    async fn cancel_shipment(&self, _fulfillment_order_id: &str) -> Result<(), FulfillmentError> {
        Err(FulfillmentError::Disabled)
    }
}
