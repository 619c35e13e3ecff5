use async_trait::async_trait;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use bazaar_core::EventSink;
use bazaar_shared::models::events::OrderEvent;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Order pipeline counters. Fed from the event stream so the domain crates
/// never touch Prometheus directly.
pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub fulfillment_created: IntCounter,
    pub fulfillment_failures: IntCounterVec,
    pub cancellations: IntCounter,
    pub tracking_updates: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("bazaar_orders_created_total", "Orders persisted")?;
        registry.register(Box::new(orders_created.clone()))?;

        let fulfillment_created = IntCounter::new(
            "bazaar_fulfillment_created_total",
            "Shipments registered with the courier",
        )?;
        registry.register(Box::new(fulfillment_created.clone()))?;

        let fulfillment_failures = IntCounterVec::new(
            Opts::new("bazaar_fulfillment_failures_total", "Courier calls that failed"),
            &["stage"],
        )?;
        registry.register(Box::new(fulfillment_failures.clone()))?;

        let cancellations = IntCounter::new("bazaar_cancellations_total", "Orders cancelled")?;
        registry.register(Box::new(cancellations.clone()))?;

        let tracking_updates = IntCounterVec::new(
            Opts::new("bazaar_tracking_updates_total", "Tracking status changes applied"),
            &["source"],
        )?;
        registry.register(Box::new(tracking_updates.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            fulfillment_created,
            fulfillment_failures,
            cancellations,
            tracking_updates,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered family.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[async_trait]
impl EventSink for Metrics {
    async fn publish(&self, event: OrderEvent) {
        match &event {
            OrderEvent::OrderPlaced(_) => self.orders_created.inc(),
            OrderEvent::FulfillmentCreated(_) => self.fulfillment_created.inc(),
            OrderEvent::FulfillmentFailed(e) => self
                .fulfillment_failures
                .with_label_values(&[e.stage.as_str()])
                .inc(),
            OrderEvent::TrackingUpdated(e) => self
                .tracking_updates
                .with_label_values(&[e.source.as_str()])
                .inc(),
            OrderEvent::OrderCancelled(_) => self.cancellations.inc(),
        }
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_shared::models::events::{FulfillmentFailedEvent, OrderCancelledEvent};
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_events_drive_counters() {
        let metrics = Metrics::new().unwrap();
        let order_id = Uuid::new_v4();

        metrics
            .publish(OrderEvent::FulfillmentFailed(FulfillmentFailedEvent {
                order_id,
                stage: "create".to_string(),
                error: "timeout".to_string(),
                timestamp: Utc::now(),
            }))
            .await;
        metrics
            .publish(OrderEvent::OrderCancelled(OrderCancelledEvent {
                order_id,
                previous_status: "Packed".to_string(),
                reason: "changed mind".to_string(),
                timestamp: Utc::now(),
            }))
            .await;

        assert_eq!(metrics.fulfillment_failures.with_label_values(&["create"]).get(), 1);
        assert_eq!(metrics.cancellations.get(), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("bazaar_fulfillment_failures_total{stage=\"create\"} 1"));
        assert!(text.contains("bazaar_cancellations_total 1"));
    }
}
