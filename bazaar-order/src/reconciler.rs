use bazaar_core::{EventSink, FulfillmentClient, Order, OrderStore, TrackingStatus, TrackingWrite};
use bazaar_shared::models::events::{OrderCancelledEvent, OrderEvent, TrackingUpdatedEvent};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::locks::OrderLocks;
use crate::manager::{check_transition, is_forward, OrderError, TransitionKind};

pub const COURIER_CANCELLATION_REASON: &str = "Cancelled by courier";

/// Courier status vocabulary, normalised (lowercase, single spaces, `_`/`-`
/// read as spaces), folded onto the internal tracking states.
///
/// | Courier status                                              | Internal         |
/// |-------------------------------------------------------------|------------------|
/// | new, invoiced                                               | Order Placed     |
/// | packed, ready to ship, awb assigned, label generated,       | Packed           |
/// | manifest generated, pickup scheduled, pickup generated,     |                  |
/// | pickup queued, pickup rescheduled, out for pickup           |                  |
/// | picked up, shipped, in transit, reached at destination hub, | Shipped          |
/// | reached destination hub, misrouted, delayed                 |                  |
/// | out for delivery                                            | Out for Delivery |
/// | delivered                                                   | Delivered        |
/// | cancelled, canceled                                         | Cancelled        |
///
/// Anything else (RTO states, lost, damaged, undelivered, blanks) is left
/// unmapped and means "no change".
pub const STATUS_TABLE: &[(&str, TrackingStatus)] = &[
    ("new", TrackingStatus::OrderPlaced),
    ("invoiced", TrackingStatus::OrderPlaced),
    ("packed", TrackingStatus::Packed),
    ("ready to ship", TrackingStatus::Packed),
    ("awb assigned", TrackingStatus::Packed),
    ("label generated", TrackingStatus::Packed),
    ("manifest generated", TrackingStatus::Packed),
    ("pickup scheduled", TrackingStatus::Packed),
    ("pickup generated", TrackingStatus::Packed),
    ("pickup queued", TrackingStatus::Packed),
    ("pickup rescheduled", TrackingStatus::Packed),
    ("out for pickup", TrackingStatus::Packed),
    ("picked up", TrackingStatus::Shipped),
    ("shipped", TrackingStatus::Shipped),
    ("in transit", TrackingStatus::Shipped),
    ("reached at destination hub", TrackingStatus::Shipped),
    ("reached destination hub", TrackingStatus::Shipped),
    ("misrouted", TrackingStatus::Shipped),
    ("delayed", TrackingStatus::Shipped),
    ("out for delivery", TrackingStatus::OutForDelivery),
    ("delivered", TrackingStatus::Delivered),
    ("cancelled", TrackingStatus::Cancelled),
    ("canceled", TrackingStatus::Cancelled),
];

fn normalize(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Total over all inputs: `None` is the "no change" answer.
pub fn map_external_status(external: &str) -> Option<TrackingStatus> {
    let key = normalize(external);
    STATUS_TABLE
        .iter()
        .find(|(courier, _)| *courier == key)
        .map(|(_, internal)| *internal)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Order has no AWB yet; nothing to ask the courier.
    NoAwb,
    /// Courier unreachable or silent; reported, not raised.
    Unavailable,
    Unchanged { status: TrackingStatus },
    Advanced {
        from: TrackingStatus,
        to: TrackingStatus,
    },
}

/// Pulls courier status for an order and applies it when it is forward
/// progress.
#[derive(Clone)]
pub struct StatusReconciler {
    store: Arc<dyn OrderStore>,
    courier: Arc<dyn FulfillmentClient>,
    events: Arc<dyn EventSink>,
    locks: OrderLocks,
}

impl StatusReconciler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        courier: Arc<dyn FulfillmentClient>,
        events: Arc<dyn EventSink>,
        locks: OrderLocks,
    ) -> Self {
        Self {
            store,
            courier,
            events,
            locks,
        }
    }

    pub async fn sync_order(&self, id: Uuid) -> Result<SyncOutcome, OrderError> {
        let order = self.store.get(id).await?.ok_or(OrderError::NotFound(id))?;
        self.sync(&order).await
    }

    pub async fn sync(&self, order: &Order) -> Result<SyncOutcome, OrderError> {
        let Some(awb) = order.awb_code.as_deref() else {
            return Ok(SyncOutcome::NoAwb);
        };
        if order.tracking_status == TrackingStatus::Cancelled {
            return Ok(SyncOutcome::Unchanged {
                status: TrackingStatus::Cancelled,
            });
        }

        let external = match self.courier.get_tracking(awb).await {
            Ok(Some(status)) => status,
            Ok(None) => return Ok(SyncOutcome::Unavailable),
            Err(e) => {
                warn!(order_id = %order.id, awb = %awb, error = %e, "Tracking lookup failed");
                return Ok(SyncOutcome::Unavailable);
            }
        };

        let mapped = map_external_status(&external);
        debug!(order_id = %order.id, external = %external, mapped = ?mapped, "Courier status");

        // Decide against the persisted value, not the caller's snapshot.
        let _guard = self.locks.acquire(order.id).await;
        let current = self
            .store
            .get(order.id)
            .await?
            .ok_or(OrderError::NotFound(order.id))?;

        let backfill_tracking_id = match current.tracking_id {
            None => Some(awb.to_string()),
            Some(_) => None,
        };

        let advance = mapped.filter(|next| match next {
            TrackingStatus::Cancelled => check_transition(
                current.tracking_status,
                TrackingStatus::Cancelled,
                TransitionKind::Cancel,
            )
            .is_ok(),
            next => is_forward(current.tracking_status, *next),
        });

        let Some(next) = advance else {
            if backfill_tracking_id.is_some() && current.tracking_status != TrackingStatus::Cancelled {
                let write = TrackingWrite {
                    status: current.tracking_status,
                    tracking_id: backfill_tracking_id,
                    cancellation_reason: None,
                };
                self.store
                    .write_tracking(current.id, current.tracking_status, &write)
                    .await?;
            }
            return Ok(SyncOutcome::Unchanged {
                status: current.tracking_status,
            });
        };

        let write = TrackingWrite {
            status: next,
            tracking_id: backfill_tracking_id,
            cancellation_reason: (next == TrackingStatus::Cancelled)
                .then(|| COURIER_CANCELLATION_REASON.to_string()),
        };
        let updated = self
            .store
            .write_tracking(current.id, current.tracking_status, &write)
            .await?;

        info!(
            order_id = %updated.id,
            from = %current.tracking_status,
            to = %updated.tracking_status,
            "Tracking reconciled from courier"
        );
        self.publish_advance(&current, &updated).await;

        Ok(SyncOutcome::Advanced {
            from: current.tracking_status,
            to: updated.tracking_status,
        })
    }

    /// Syncs several orders concurrently; each result stands alone.
    pub async fn sync_many(&self, orders: &[Order]) -> Vec<(Uuid, Result<SyncOutcome, OrderError>)> {
        let syncs = orders.iter().map(|order| async move {
            (order.id, self.sync(order).await)
        });
        join_all(syncs).await
    }

    async fn publish_advance(&self, before: &Order, after: &Order) {
        let event = if after.tracking_status == TrackingStatus::Cancelled {
            OrderEvent::OrderCancelled(OrderCancelledEvent {
                order_id: after.id,
                previous_status: before.tracking_status.to_string(),
                reason: COURIER_CANCELLATION_REASON.to_string(),
                timestamp: Utc::now(),
            })
        } else {
            OrderEvent::TrackingUpdated(TrackingUpdatedEvent {
                order_id: after.id,
                from: before.tracking_status.to_string(),
                to: after.tracking_status.to_string(),
                source: "reconciler".to_string(),
                timestamp: Utc::now(),
            })
        };
        self.events.publish(event).await;
    }
}
