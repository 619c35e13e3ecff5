use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Operational events emitted by the order pipeline. Consumers are the
/// notification trigger point, metrics and the ops channel for courier failures.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedEvent),
    FulfillmentCreated(FulfillmentCreatedEvent),
    FulfillmentFailed(FulfillmentFailedEvent),
    TrackingUpdated(TrackingUpdatedEvent),
    OrderCancelled(OrderCancelledEvent),
}

impl OrderEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::FulfillmentCreated(e) => e.order_id,
            OrderEvent::FulfillmentFailed(e) => e.order_id,
            OrderEvent::TrackingUpdated(e) => e.order_id,
            OrderEvent::OrderCancelled(e) => e.order_id,
        }
    }

    /// Topic name used when the event is shipped to a broker.
    pub fn topic(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "order.placed",
            OrderEvent::FulfillmentCreated(_) => "fulfillment.created",
            OrderEvent::FulfillmentFailed(_) => "fulfillment.failed",
            OrderEvent::TrackingUpdated(_) => "order.tracking_updated",
            OrderEvent::OrderCancelled(_) => "order.cancelled",
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub user_id: Option<String>,
    pub total_amount: Decimal,
    pub payment_status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct FulfillmentCreatedEvent {
    pub order_id: Uuid,
    pub fulfillment_order_id: String,
    pub awb_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct FulfillmentFailedEvent {
    pub order_id: Uuid,
    /// "create" or "cancel"
    pub stage: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TrackingUpdatedEvent {
    pub order_id: Uuid,
    pub from: String,
    pub to: String,
    /// "admin" or "reconciler"
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub previous_status: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
