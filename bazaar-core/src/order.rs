use bazaar_shared::Masked;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Delivery progress as the storefront reports it. The courier's richer
/// vocabulary is folded onto these six values by the reconciler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrackingStatus {
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    Packed,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl TrackingStatus {
    /// Forward states in lifecycle order.
    pub const FORWARD: [TrackingStatus; 5] = [
        TrackingStatus::OrderPlaced,
        TrackingStatus::Packed,
        TrackingStatus::Shipped,
        TrackingStatus::OutForDelivery,
        TrackingStatus::Delivered,
    ];

    /// Position along the forward path. `Cancelled` sits off the path.
    pub fn rank(self) -> Option<u8> {
        match self {
            TrackingStatus::OrderPlaced => Some(0),
            TrackingStatus::Packed => Some(1),
            TrackingStatus::Shipped => Some(2),
            TrackingStatus::OutForDelivery => Some(3),
            TrackingStatus::Delivered => Some(4),
            TrackingStatus::Cancelled => None,
        }
    }

    /// Only orders that have not left the warehouse may be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, TrackingStatus::OrderPlaced | TrackingStatus::Packed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackingStatus::OrderPlaced => "Order Placed",
            TrackingStatus::Packed => "Packed",
            TrackingStatus::Shipped => "Shipped",
            TrackingStatus::OutForDelivery => "Out for Delivery",
            TrackingStatus::Delivered => "Delivered",
            TrackingStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackingStatus::FORWARD
            .iter()
            .chain(std::iter::once(&TrackingStatus::Cancelled))
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::ParseError(format!("tracking status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(CoreError::ParseError(format!("payment status '{}'", other))),
        }
    }
}

/// How the customer chose to pay at checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery, settled by the courier.
    Cod,
    /// Hosted checkout gateway with a client-side callback.
    Online,
    /// Signed-request gateway that hands the customer a redirect URL.
    Redirect,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Online => "online",
            PaymentMethod::Redirect => "redirect",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub mobile: Masked<String>,
    #[serde(default)]
    pub email: Option<Masked<String>>,
}

impl Customer {
    /// Courier APIs want first/last name; everything after the first word is
    /// treated as the last name.
    pub fn split_name(&self) -> (String, String) {
        let mut parts = self.name.split_whitespace();
        let first = parts.next().unwrap_or_default().to_string();
        let last = parts.collect::<Vec<_>>().join(" ");
        (first, last)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub state: String,
    pub district: String,
    pub place: String,
    pub house_address: String,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
}

/// Line item snapshot taken at checkout. Later catalog edits never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Order creation input, after payment has been resolved by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer: Customer,
    pub address: Address,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<String>,
}

impl OrderDraft {
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Checks every required field and reports all offenders at once.
    pub fn validate(&self) -> CoreResult<()> {
        let mut missing = Vec::new();

        let required = [
            ("customer.name", self.customer.name.as_str()),
            ("customer.mobile", self.customer.mobile.expose()),
            ("address.state", self.address.state.as_str()),
            ("address.district", self.address.district.as_str()),
            ("address.place", self.address.place.as_str()),
            ("address.houseAddress", self.address.house_address.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                missing.push(field.to_string());
            }
        }

        if self.items.is_empty() {
            missing.push("items".to_string());
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.product_id.trim().is_empty() {
                missing.push(format!("items[{}].productId", idx));
            }
            if item.quantity == 0 {
                missing.push(format!("items[{}].quantity", idx));
            }
            if item.price.is_sign_negative() {
                missing.push(format!("items[{}].price", idx));
            }
        }

        // A discount applied upstream may lower the total, nothing may raise it.
        // Stored as NUMERIC(12, 2); finer amounts would be rounded on insert.
        if self.total_amount <= Decimal::ZERO
            || self.total_amount > self.items_total()
            || self.total_amount.normalize().scale() > 2
        {
            missing.push("total_amount".to_string());
        }

        if self.payment_status == PaymentStatus::Failed {
            missing.push("payment_status".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationError(missing))
        }
    }
}

/// Identifiers handed back by the courier once a shipment exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShipmentRef {
    pub fulfillment_order_id: String,
    pub fulfillment_shipment_id: String,
    pub awb_code: Option<String>,
}

/// The durable record of a completed checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub customer: Customer,
    pub address: Address,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub tracking_status: TrackingStatus,
    pub tracking_id: Option<String>,
    pub fulfillment_order_id: Option<String>,
    pub fulfillment_shipment_id: Option<String>,
    pub awb_code: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl Order {
    pub fn from_draft(draft: OrderDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id: draft.user_id,
            customer: draft.customer,
            address: draft.address,
            items: draft.items,
            total_amount: draft.total_amount,
            payment_status: draft.payment_status,
            payment_reference: draft.payment_reference,
            tracking_status: TrackingStatus::OrderPlaced,
            tracking_id: None,
            fulfillment_order_id: None,
            fulfillment_shipment_id: None,
            awb_code: None,
            cancellation_reason: None,
        }
    }

    pub fn has_shipment(&self) -> bool {
        self.fulfillment_order_id.is_some()
    }

    pub fn apply_shipment(&mut self, shipment: &ShipmentRef) {
        self.fulfillment_order_id = Some(shipment.fulfillment_order_id.clone());
        self.fulfillment_shipment_id = Some(shipment.fulfillment_shipment_id.clone());
        self.awb_code = shipment.awb_code.clone();
        self.updated_at = Utc::now();
    }

    pub fn apply_tracking(&mut self, write: &TrackingWrite) {
        self.tracking_status = write.status;
        if let Some(tracking_id) = &write.tracking_id {
            self.tracking_id = Some(tracking_id.clone());
        }
        if let Some(reason) = &write.cancellation_reason {
            self.cancellation_reason = Some(reason.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// A single tracking mutation. `None` fields leave the stored value alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingWrite {
    pub status: TrackingStatus,
    pub tracking_id: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl TrackingWrite {
    pub fn status(status: TrackingStatus) -> Self {
        Self {
            status,
            tracking_id: None,
            cancellation_reason: None,
        }
    }
}
