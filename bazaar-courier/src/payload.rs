use bazaar_core::{Order, PaymentStatus};
use rust_decimal::Decimal;
use serde::Serialize;

/// Parcel declaration sent with every shipment. The storefront does not track
/// per-product dimensions, so one configured box is used for everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub length_cm: Decimal,
    pub breadth_cm: Decimal,
    pub height_cm: Decimal,
    pub weight_kg: Decimal,
}

impl Default for PackageSpec {
    fn default() -> Self {
        Self {
            length_cm: Decimal::new(10, 0),
            breadth_cm: Decimal::new(10, 0),
            height_cm: Decimal::new(10, 0),
            weight_kg: Decimal::new(5, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayloadItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    pub selling_price: Decimal,
}

/// Ad-hoc order body for the courier's create endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateOrderPayload {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_pincode: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<PayloadItem>,
    pub payment_method: String,
    pub sub_total: Decimal,
    pub length: Decimal,
    pub breadth: Decimal,
    pub height: Decimal,
    pub weight: Decimal,
}

/// Unpaid orders are collected on delivery; anything already paid ships
/// prepaid.
pub fn payment_method_flag(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "COD",
        PaymentStatus::Paid | PaymentStatus::Failed => "Prepaid",
    }
}

pub fn build_create_payload(
    order: &Order,
    pickup_location: &str,
    package: &PackageSpec,
) -> CreateOrderPayload {
    let (first, last) = order.customer.split_name();
    let address = &order.address;

    let billing_address_2 = match address.landmark.as_deref().map(str::trim) {
        Some(landmark) if !landmark.is_empty() => format!("{}, {}", address.place, landmark),
        _ => address.place.clone(),
    };

    CreateOrderPayload {
        order_id: order.id.to_string(),
        order_date: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        pickup_location: pickup_location.to_string(),
        billing_customer_name: first,
        billing_last_name: last,
        billing_address: address.house_address.clone(),
        billing_address_2,
        billing_city: address.district.clone(),
        billing_pincode: address.pincode.clone().unwrap_or_default(),
        billing_state: address.state.clone(),
        billing_country: "India".to_string(),
        billing_email: order
            .customer
            .email
            .as_ref()
            .map(|e| e.expose().to_string())
            .unwrap_or_default(),
        billing_phone: order.customer.mobile.expose().to_string(),
        shipping_is_billing: true,
        order_items: order
            .items
            .iter()
            .map(|item| PayloadItem {
                name: item.name.clone(),
                sku: item.product_id.clone(),
                units: item.quantity,
                selling_price: item.price,
            })
            .collect(),
        payment_method: payment_method_flag(order.payment_status).to_string(),
        sub_total: order.total_amount,
        length: package.length_cm,
        breadth: package.breadth_cm,
        height: package.height_cm,
        weight: package.weight_kg,
    }
}
