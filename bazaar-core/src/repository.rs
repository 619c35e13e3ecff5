use async_trait::async_trait;
use uuid::Uuid;

use crate::order::{Order, PaymentStatus, ShipmentRef, TrackingStatus, TrackingWrite};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        id: Uuid,
        expected: TrackingStatus,
        actual: TrackingStatus,
    },

    #[error("Order already exists: {0}")]
    Duplicate(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for orders; the single source of truth for tracking and
/// payment status.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>>;

    /// Newest first, capped at `limit`.
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<Order>>;

    async fn record_shipment(&self, id: Uuid, shipment: &ShipmentRef) -> StoreResult<Order>;

    /// Compare-and-set on `tracking_status`: the write lands only if the
    /// persisted status still equals `expected`, otherwise `Conflict`.
    async fn write_tracking(
        &self,
        id: Uuid,
        expected: TrackingStatus,
        write: &TrackingWrite,
    ) -> StoreResult<Order>;

    async fn set_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reference: Option<&str>,
    ) -> StoreResult<Order>;
}
