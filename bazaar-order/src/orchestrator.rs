use bazaar_core::{
    EventSink, FulfillmentClient, FulfillmentError, Order, OrderDraft, OrderStore, PaymentStatus,
    StoreError, TrackingStatus, TrackingWrite,
};
use bazaar_shared::models::events::{
    FulfillmentCreatedEvent, FulfillmentFailedEvent, OrderCancelledEvent, OrderEvent,
    OrderPlacedEvent, TrackingUpdatedEvent,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::locks::OrderLocks;
use crate::manager::{check_transition, OrderError, TransitionKind};
use crate::reconciler::StatusReconciler;

const MAX_WRITE_ATTEMPTS: usize = 3;

/// Order lifecycle: placement, courier hand-off, admin tracking updates and
/// cancellation. Every tracking write is validated against the persisted
/// status under the order's lock and lands through a compare-and-set.
#[derive(Clone)]
pub struct OrderOrchestrator {
    store: Arc<dyn OrderStore>,
    courier: Arc<dyn FulfillmentClient>,
    events: Arc<dyn EventSink>,
    locks: OrderLocks,
}

impl OrderOrchestrator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        courier: Arc<dyn FulfillmentClient>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            courier,
            events,
            locks: OrderLocks::new(),
        }
    }

    /// Reconciler sharing this orchestrator's store, courier and locks.
    pub fn reconciler(&self) -> StatusReconciler {
        StatusReconciler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.courier),
            Arc::clone(&self.events),
            self.locks.clone(),
        )
    }

    /// Persists the order, then tries once to register it with the courier.
    /// A courier failure is logged and published but never fails placement.
    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, OrderError> {
        draft.validate()?;

        let order = Order::from_draft(draft);
        self.store.insert(&order).await?;

        info!(
            order_id = %order.id,
            total = %order.total_amount,
            payment_status = %order.payment_status,
            "Order placed"
        );
        self.events
            .publish(OrderEvent::OrderPlaced(OrderPlacedEvent {
                order_id: order.id,
                user_id: order.user_id.clone(),
                total_amount: order.total_amount,
                payment_status: order.payment_status.to_string(),
                timestamp: Utc::now(),
            }))
            .await;

        match self.attempt_fulfillment(&order).await {
            Ok(updated) => Ok(updated),
            Err(_) => Ok(order),
        }
    }

    /// Manual courier hand-off for orders whose first attempt failed.
    pub async fn retry_fulfillment(&self, id: Uuid) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(id).await;
        let order = self.load(id).await?;

        if order.tracking_status == TrackingStatus::Cancelled {
            return Err(crate::manager::TransitionError::AlreadyCancelled.into());
        }
        if order.has_shipment() {
            return Ok(order);
        }

        self.attempt_fulfillment(&order)
            .await
            .map_err(|e| OrderError::Fulfillment(e.to_string()))
    }

    async fn attempt_fulfillment(&self, order: &Order) -> Result<Order, FulfillmentError> {
        // Run the courier call on its own task so a panic inside the client
        // is contained like any other courier failure.
        let courier = Arc::clone(&self.courier);
        let snapshot = order.clone();
        let attempt = tokio::spawn(async move { courier.create_shipment(&snapshot).await })
            .await
            .unwrap_or_else(|join| Err(FulfillmentError::Unreachable(join.to_string())));

        let shipment = match attempt {
            Ok(shipment) => shipment,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Courier order creation failed");
                self.publish_failure(order.id, "create", &e.to_string()).await;
                return Err(e);
            }
        };

        match self.store.record_shipment(order.id, &shipment).await {
            Ok(updated) => {
                info!(
                    order_id = %updated.id,
                    fulfillment_order_id = %shipment.fulfillment_order_id,
                    awb = ?shipment.awb_code,
                    "Courier shipment created"
                );
                self.events
                    .publish(OrderEvent::FulfillmentCreated(FulfillmentCreatedEvent {
                        order_id: updated.id,
                        fulfillment_order_id: shipment.fulfillment_order_id.clone(),
                        awb_code: shipment.awb_code.clone(),
                        timestamp: Utc::now(),
                    }))
                    .await;
                Ok(updated)
            }
            Err(e) => {
                error!(
                    order_id = %order.id,
                    fulfillment_order_id = %shipment.fulfillment_order_id,
                    error = %e,
                    "Courier shipment created but identifiers could not be stored"
                );
                self.publish_failure(order.id, "create", &e.to_string()).await;
                Err(FulfillmentError::Unreachable(e.to_string()))
            }
        }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.load(id).await
    }

    pub async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    pub async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_recent(limit).await?)
    }

    /// Admin status change. Cancellation has its own entry point.
    pub async fn update_tracking(
        &self,
        id: Uuid,
        status: TrackingStatus,
        tracking_id: Option<String>,
    ) -> Result<Order, OrderError> {
        if status == TrackingStatus::Cancelled {
            return Err(OrderError::Validation(vec![
                "tracking_status (use the cancel operation to cancel an order)".to_string(),
            ]));
        }
        let tracking_id = tracking_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let _guard = self.locks.acquire(id).await;
        let write = TrackingWrite {
            status,
            tracking_id,
            cancellation_reason: None,
        };
        let (before, after) = self.write_checked(id, &write, TransitionKind::Admin).await?;

        info!(order_id = %id, from = %before, to = %after.tracking_status, "Tracking updated");
        self.events
            .publish(OrderEvent::TrackingUpdated(TrackingUpdatedEvent {
                order_id: id,
                from: before.to_string(),
                to: after.tracking_status.to_string(),
                source: "admin".to_string(),
                timestamp: Utc::now(),
            }))
            .await;
        Ok(after)
    }

    /// Cancels an order that has not left the warehouse. The courier is told
    /// first on a best-effort basis; the local cancellation stands either way.
    pub async fn cancel(&self, id: Uuid, reason: &str) -> Result<Order, OrderError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderError::Validation(vec!["reason".to_string()]));
        }

        let _guard = self.locks.acquire(id).await;
        let current = self.load(id).await?;
        check_transition(current.tracking_status, TrackingStatus::Cancelled, TransitionKind::Cancel)?;

        if let Some(external_id) = current.fulfillment_order_id.as_deref() {
            if let Err(e) = self.courier.cancel_shipment(external_id).await {
                warn!(order_id = %id, error = %e, "Courier cancellation failed; cancelling locally");
                self.publish_failure(id, "cancel", &e.to_string()).await;
            }
        }

        let write = TrackingWrite {
            status: TrackingStatus::Cancelled,
            tracking_id: None,
            cancellation_reason: Some(reason.to_string()),
        };
        let (before, after) = self.write_checked(id, &write, TransitionKind::Cancel).await?;

        info!(order_id = %id, previous = %before, reason = %reason, "Order cancelled");
        self.events
            .publish(OrderEvent::OrderCancelled(OrderCancelledEvent {
                order_id: id,
                previous_status: before.to_string(),
                reason: reason.to_string(),
                timestamp: Utc::now(),
            }))
            .await;
        Ok(after)
    }

    /// Records the outcome of collecting money: `pending` moves to `paid` or
    /// `failed`, and settled payments stay settled.
    pub async fn record_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reference: Option<String>,
    ) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(id).await;
        let current = self.load(id).await?;

        if current.payment_status == status && reference.is_none() {
            return Ok(current);
        }
        if current.payment_status != PaymentStatus::Pending && current.payment_status != status {
            return Err(OrderError::Validation(vec![format!(
                "payment_status (order is already {}, cannot become {})",
                current.payment_status, status
            )]));
        }

        let reference = reference.or(current.payment_reference);
        let updated = self
            .store
            .set_payment(id, status, reference.as_deref())
            .await?;
        info!(order_id = %id, payment_status = %status, "Payment status recorded");
        Ok(updated)
    }

    /// Validates against the persisted status and writes with compare-and-set,
    /// re-reading when another writer got there first.
    async fn write_checked(
        &self,
        id: Uuid,
        write: &TrackingWrite,
        kind: TransitionKind,
    ) -> Result<(TrackingStatus, Order), OrderError> {
        let mut last_conflict = None;
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let current = self.load(id).await?;
            check_transition(current.tracking_status, write.status, kind)?;

            match self
                .store
                .write_tracking(id, current.tracking_status, write)
                .await
            {
                Ok(updated) => return Ok((current.tracking_status, updated)),
                Err(conflict @ StoreError::Conflict { .. }) => {
                    warn!(order_id = %id, error = %conflict, "Tracking write lost a race, re-reading");
                    last_conflict = Some(conflict);
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(last_conflict.map_or(OrderError::Conflict(id), OrderError::from))
    }

    async fn load(&self, id: Uuid) -> Result<Order, OrderError> {
        self.store.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    async fn publish_failure(&self, order_id: Uuid, stage: &str, error: &str) {
        self.events
            .publish(OrderEvent::FulfillmentFailed(FulfillmentFailedEvent {
                order_id,
                stage: stage.to_string(),
                error: error.to_string(),
                timestamp: Utc::now(),
            }))
            .await;
    }
}
