use async_trait::async_trait;
use bazaar_core::{
    Order, OrderStore, PaymentStatus, ShipmentRef, StoreError, StoreResult, TrackingStatus,
    TrackingWrite,
};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local `OrderStore` with the same compare-and-set behaviour as the
/// Postgres store. Used for tests and for running without a database.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(order.id));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let mine = orders
            .values()
            .filter(|o| o.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        Ok(Self::newest_first(mine))
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<Order>> {
        let all = self.orders.read().await.values().cloned().collect();
        let mut recent = Self::newest_first(all);
        recent.truncate(limit);
        Ok(recent)
    }

    async fn record_shipment(&self, id: Uuid, shipment: &ShipmentRef) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.apply_shipment(shipment);
        Ok(order.clone())
    }

    async fn write_tracking(
        &self,
        id: Uuid,
        expected: TrackingStatus,
        write: &TrackingWrite,
    ) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if order.tracking_status != expected {
            return Err(StoreError::Conflict {
                id,
                expected,
                actual: order.tracking_status,
            });
        }
        order.apply_tracking(write);
        Ok(order.clone())
    }

    async fn set_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reference: Option<&str>,
    ) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.payment_status = status;
        if let Some(reference) = reference {
            order.payment_reference = Some(reference.to_string());
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}
