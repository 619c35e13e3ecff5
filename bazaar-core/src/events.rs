use async_trait::async_trait;
use bazaar_shared::models::events::OrderEvent;
use std::sync::Arc;

/// Operational channel for order lifecycle events. Publishing never fails
/// the caller; sinks swallow and log their own errors.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: OrderEvent);
}

/// Writes every event to the tracing log. Courier failures go out at `error`.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, event: OrderEvent) {
        match &event {
            OrderEvent::FulfillmentFailed(failure) => tracing::error!(
                order_id = %failure.order_id,
                stage = %failure.stage,
                error = %failure.error,
                "Courier call failed; order kept without external ids"
            ),
            other => tracing::info!(
                order_id = %other.order_id(),
                topic = other.topic(),
                "Order event"
            ),
        }
    }
}

#[async_trait]
impl EventSink for Vec<Arc<dyn EventSink>> {
    async fn publish(&self, event: OrderEvent) {
        for sink in self {
            sink.publish(event.clone()).await;
        }
    }
}
