use async_trait::async_trait;
use bazaar_core::{
    Address, Customer, LineItem, Order, OrderStore, PaymentStatus, ShipmentRef, StoreError,
    StoreResult, TrackingStatus, TrackingWrite,
};
use bazaar_shared::Masked;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, created_at, updated_at, user_id, customer_name, customer_mobile, \
     customer_email, address, items, total_amount, payment_status, payment_reference, \
     tracking_status, tracking_id, fulfillment_order_id, fulfillment_shipment_id, awb_code, \
     cancellation_reason";

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Order::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_id: Option<String>,
    customer_name: String,
    customer_mobile: String,
    customer_email: Option<String>,
    address: Json<Address>,
    items: Json<Vec<LineItem>>,
    total_amount: Decimal,
    payment_status: String,
    payment_reference: Option<String>,
    tracking_status: String,
    tracking_id: Option<String>,
    fulfillment_order_id: Option<String>,
    fulfillment_shipment_id: Option<String>,
    awb_code: Option<String>,
    cancellation_reason: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_status: PaymentStatus = row
            .payment_status
            .parse()
            .map_err(|e: bazaar_core::CoreError| StoreError::Backend(e.to_string()))?;
        let tracking_status: TrackingStatus = row
            .tracking_status
            .parse()
            .map_err(|e: bazaar_core::CoreError| StoreError::Backend(e.to_string()))?;

        Ok(Order {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_id: row.user_id,
            customer: Customer {
                name: row.customer_name,
                mobile: Masked(row.customer_mobile),
                email: row.customer_email.map(Masked),
            },
            address: row.address.0,
            items: row.items.0,
            total_amount: row.total_amount,
            payment_status,
            payment_reference: row.payment_reference,
            tracking_status,
            tracking_id: row.tracking_id,
            fulfillment_order_id: row.fulfillment_order_id,
            fulfillment_shipment_id: row.fulfillment_shipment_id,
            awb_code: row.awb_code,
            cancellation_reason: row.cancellation_reason,
        })
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, created_at, updated_at, user_id, customer_name, customer_mobile,
                                customer_email, address, items, total_amount, payment_status,
                                payment_reference, tracking_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(&order.user_id)
        .bind(&order.customer.name)
        .bind(order.customer.mobile.expose())
        .bind(order.customer.email.as_ref().map(|e| e.expose().to_string()))
        .bind(Json(&order.address))
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(order.payment_status.as_str())
        .bind(&order.payment_reference)
        .bind(order.tracking_status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(order.id))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.fetch(id).await
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC LIMIT $1",
            ORDER_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn record_shipment(&self, id: Uuid, shipment: &ShipmentRef) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET fulfillment_order_id = $2, fulfillment_shipment_id = $3, awb_code = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(&shipment.fulfillment_order_id)
        .bind(&shipment.fulfillment_shipment_id)
        .bind(&shipment.awb_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or(StoreError::NotFound(id))
    }

    async fn write_tracking(
        &self,
        id: Uuid,
        expected: TrackingStatus,
        write: &TrackingWrite,
    ) -> StoreResult<Order> {
        // The status guard in WHERE is the compare-and-set.
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET tracking_status = $3,
                tracking_id = COALESCE($4, tracking_id),
                cancellation_reason = COALESCE($5, cancellation_reason),
                updated_at = NOW()
            WHERE id = $1 AND tracking_status = $2
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(write.status.as_str())
        .bind(&write.tracking_id)
        .bind(&write.cancellation_reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = row {
            return Order::try_from(row);
        }

        match self.fetch(id).await? {
            None => Err(StoreError::NotFound(id)),
            Some(current) => Err(StoreError::Conflict {
                id,
                expected,
                actual: current.tracking_status,
            }),
        }
    }

    async fn set_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reference: Option<&str>,
    ) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET payment_status = $2, payment_reference = COALESCE($3, payment_reference), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Order::try_from)
            .transpose()?
            .ok_or(StoreError::NotFound(id))
    }
}
