use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bazaar_api::middleware::AdminClaims;
use bazaar_api::state::{AppState, AuthConfig, RateLimitConfig, Wiring};
use bazaar_api::{app, worker};
use bazaar_core::{FulfillmentClient, FulfillmentError, Order, PaymentAdapter, ShipmentRef};
use bazaar_order::payment::{HostedCheckoutGateway, HostedGatewayConfig};
use bazaar_order::PricingConfig;
use bazaar_store::MemoryOrderStore;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct StubCourier {
    creates: AtomicUsize,
    tracking: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl FulfillmentClient for StubCourier {
    async fn create_shipment(&self, order: &Order) -> Result<ShipmentRef, FulfillmentError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ShipmentRef {
            fulfillment_order_id: format!("SR-{}", n),
            fulfillment_shipment_id: format!("SH-{}", n),
            awb_code: Some(format!("AWB-{}", order.id.simple())),
        })
    }

    async fn get_tracking(&self, awb_code: &str) -> Result<Option<String>, FulfillmentError> {
        Ok(self.tracking.lock().unwrap().get(awb_code).cloned())
    }

    async fn cancel_shipment(&self, _fulfillment_order_id: &str) -> Result<(), FulfillmentError> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    courier: Arc<StubCourier>,
    hosted: Arc<HostedCheckoutGateway>,
}

fn test_app() -> TestApp {
    let courier = Arc::new(StubCourier {
        creates: AtomicUsize::new(0),
        tracking: Mutex::new(HashMap::new()),
    });
    let hosted = Arc::new(HostedCheckoutGateway::new(HostedGatewayConfig {
        key_id: "key_test".to_string(),
        key_secret: "hosted-secret".to_string(),
        currency: "INR".to_string(),
        callback_url: "https://shop.example/checkout/complete".to_string(),
    }));

    let state = AppState::assemble(Wiring {
        store: Arc::new(MemoryOrderStore::new()),
        courier: courier.clone(),
        sinks: Vec::new(),
        gateways: vec![hosted.clone() as Arc<dyn PaymentAdapter>],
        pricing: PricingConfig::default(),
        currency: "INR".to_string(),
        redis: None,
        rate_limit: RateLimitConfig::default(),
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
    })
    .unwrap();

    TestApp {
        router: app(state.clone()),
        state,
        courier,
        hosted,
    }
}

fn token(role: &str) -> String {
    let claims = AdminClaims {
        sub: "ops-1".to_string(),
        email: "ops@shop.example".to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn draft(total: f64) -> Value {
    json!({
        "customer": { "name": "Asha Menon", "mobile": "9876543210" },
        "address": {
            "state": "Kerala",
            "district": "Ernakulam",
            "place": "Kakkanad",
            "houseAddress": "12/4 Rose Villa",
            "pincode": "682030"
        },
        "items": [
            { "productId": "p-1", "name": "Linen Kurta", "price": 1000, "quantity": 1, "size": "M" }
        ],
        "total_amount": total,
        "payment_status": "pending",
        "userId": "user-42"
    })
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn place_cod_order(app: &TestApp) -> Value {
    let (status, order) = send(&app.router, Method::POST, "/v1/orders", Some(draft(1000.0)), None).await;
    assert_eq!(status, StatusCode::CREATED);
    order
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_quote_applies_online_discount_only() {
    let app = test_app();
    let items = draft(1000.0)["items"].clone();

    let (status, online) = send(
        &app.router,
        Method::POST,
        "/v1/checkout/quote",
        Some(json!({ "items": items, "paymentMethod": "online" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(online["taxComponent"].as_f64(), Some(180.0));
    assert_eq!(online["base"].as_f64(), Some(820.0));
    assert_eq!(online["discount"].as_f64(), Some(50.0));
    assert_eq!(online["finalTotal"].as_f64(), Some(950.0));

    let (_, cod) = send(
        &app.router,
        Method::POST,
        "/v1/checkout/quote",
        Some(json!({ "items": items, "paymentMethod": "cod" })),
        None,
    )
    .await;
    assert_eq!(cod["discount"].as_f64(), Some(0.0));
    assert_eq!(cod["finalTotal"].as_f64(), Some(1000.0));
}

#[tokio::test]
async fn test_cod_order_is_created_pending_and_shipped_to_courier() {
    let app = test_app();
    let order = place_cod_order(&app).await;

    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["tracking_status"], "Order Placed");
    assert_eq!(order["fulfillment_order_id"], "SR-1");
    assert!(order["awb_code"].as_str().unwrap().starts_with("AWB-"));
    assert_eq!(app.courier.creates.load(Ordering::SeqCst), 1);

    let id = order["id"].as_str().unwrap();
    let (status, fetched) = send(&app.router, Method::GET, &format!("/v1/orders/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order["id"]);

    let (status, list) = send(&app.router, Method::GET, "/v1/orders?user_id=user-42", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cod_checkout_ignores_client_claimed_payment() {
    let app = test_app();
    let mut body = draft(1000.0);
    body["payment_status"] = json!("paid");
    body["payment_reference"] = json!("forged");

    let (status, order) = send(&app.router, Method::POST, "/v1/orders", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["payment_reference"], Value::Null);
}

#[tokio::test]
async fn test_invalid_order_lists_missing_fields() {
    let app = test_app();
    let mut body = draft(1000.0);
    body["address"]["district"] = json!("");
    body["total_amount"] = json!(5000);

    let (status, err) = send(&app.router, Method::POST, "/v1/orders", Some(body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "VALIDATION_ERROR");
    let message = err["error"].as_str().unwrap();
    assert!(message.contains("address.district"));
    assert!(message.contains("total_amount"));
    assert_eq!(app.courier.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = test_app();
    let uri = format!("/v1/orders/{}", uuid::Uuid::new_v4());
    let (status, err) = send(&app.router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_customer_cancel_rules() {
    let app = test_app();
    let order = place_cod_order(&app).await;
    let uri = format!("/v1/orders/{}/cancel", order["id"].as_str().unwrap());

    let (status, _) = send(&app.router, Method::POST, &uri, Some(json!({ "reason": "  " })), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, cancelled) =
        send(&app.router, Method::POST, &uri, Some(json!({ "reason": "ordered twice" })), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["tracking_status"], "Cancelled");
    assert_eq!(cancelled["cancellation_reason"], "ordered twice");

    let (status, err) =
        send(&app.router, Method::POST, &uri, Some(json!({ "reason": "again" })), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "ALREADY_CANCELLED");
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let app = test_app();

    let (status, _) = send(&app.router, Method::GET, "/v1/admin/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, Method::GET, "/v1/admin/orders", None, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = token("CUSTOMER");
    let (status, _) = send(&app.router, Method::GET, "/v1/admin/orders", None, Some(customer.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token("SUPER_ADMIN");
    let (status, body) = send(&app.router, Method::GET, "/v1/admin/orders", None, Some(admin.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_tracking_rules_surface_distinct_codes() {
    let app = test_app();
    let admin = token("ADMIN");
    let order = place_cod_order(&app).await;
    let id = order["id"].as_str().unwrap();
    let tracking_uri = format!("/v1/admin/orders/{}/tracking", id);

    let (status, shipped) = send(
        &app.router,
        Method::PUT,
        &tracking_uri,
        Some(json!({ "status": "Shipped", "trackingId": " TRK-9 " })),
        Some(admin.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["tracking_status"], "Shipped");
    assert_eq!(shipped["tracking_id"], "TRK-9");

    let (status, err) = send(
        &app.router,
        Method::PUT,
        &tracking_uri,
        Some(json!({ "status": "Packed" })),
        Some(admin.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "BACKWARD_TRANSITION");

    let (status, _) = send(
        &app.router,
        Method::PUT,
        &tracking_uri,
        Some(json!({ "status": "Cancelled" })),
        Some(admin.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, err) = send(
        &app.router,
        Method::POST,
        &format!("/v1/admin/orders/{}/cancel", id),
        Some(json!({ "reason": "customer called" })),
        Some(admin.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "TOO_LATE_TO_CANCEL");
}

#[tokio::test]
async fn test_admin_records_cod_payment_once() {
    let app = test_app();
    let admin = token("ADMIN");
    let order = place_cod_order(&app).await;
    let uri = format!("/v1/admin/orders/{}/payment", order["id"].as_str().unwrap());

    let (status, paid) = send(
        &app.router,
        Method::PUT,
        &uri,
        Some(json!({ "status": "paid", "reference": "cash-001" })),
        Some(admin.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["payment_reference"], "cash-001");

    let (status, _) = send(&app.router, Method::PUT, &uri, Some(json!({ "status": "failed" })), Some(admin.as_str())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sync_advances_from_courier_status() {
    let app = test_app();
    let order = place_cod_order(&app).await;
    let id = order["id"].as_str().unwrap();
    app.courier
        .tracking
        .lock()
        .unwrap()
        .insert(order["awb_code"].as_str().unwrap().to_string(), "IN TRANSIT".to_string());

    let (status, body) = send(&app.router, Method::POST, &format!("/v1/orders/{}/sync", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["result"], "advanced");
    assert_eq!(body["outcome"]["to"], "Shipped");
    assert_eq!(body["order"]["tracking_status"], "Shipped");
    assert_eq!(body["order"]["tracking_id"], order["awb_code"]);

    let (_, again) = send(&app.router, Method::POST, &format!("/v1/orders/{}/sync", id), None, None).await;
    assert_eq!(again["outcome"]["result"], "unchanged");
}

#[tokio::test]
async fn test_refresh_on_read_pulls_courier_status() {
    let app = test_app();
    let order = place_cod_order(&app).await;
    let id = order["id"].as_str().unwrap();
    app.courier
        .tracking
        .lock()
        .unwrap()
        .insert(order["awb_code"].as_str().unwrap().to_string(), "Out For Delivery".to_string());

    let (_, stale) = send(&app.router, Method::GET, &format!("/v1/orders/{}", id), None, None).await;
    assert_eq!(stale["tracking_status"], "Order Placed");

    let (_, fresh) =
        send(&app.router, Method::GET, &format!("/v1/orders/{}?refresh=true", id), None, None).await;
    assert_eq!(fresh["tracking_status"], "Out for Delivery");
}

#[tokio::test]
async fn test_online_checkout_creates_paid_order_only_after_verified_completion() {
    let app = test_app();

    let (status, started) =
        send(&app.router, Method::POST, "/v1/payments/online", Some(draft(950.0)), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started["status"], "awaiting_payment");
    assert_eq!(started["initiation"]["kind"], "checkout");
    assert_eq!(started["initiation"]["amount_minor"], 95000);
    let reference = started["initiation"]["reference"].as_str().unwrap().to_string();

    let (_, orders) = send(&app.router, Method::GET, "/v1/orders?user_id=user-42", None, None).await;
    assert!(orders.as_array().unwrap().is_empty());

    let forged = json!({
        "reference": reference,
        "outcome": "success",
        "payment_id": "pay_1",
        "signature": "deadbeef"
    });
    let (status, err) =
        send(&app.router, Method::POST, "/v1/payments/online/complete", Some(forged), None).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(err["retryable"], true);
    assert_eq!(app.state.checkout.pending_count(), 1);

    let signature = app.hosted.sign(&reference, "pay_2").unwrap();
    let signal = json!({
        "reference": reference,
        "outcome": "success",
        "payment_id": "pay_2",
        "signature": signature
    });

    let (status, order) =
        send(&app.router, Method::POST, "/v1/payments/online/complete", Some(signal.clone()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["payment_reference"], "pay_2");
    assert_eq!(order["total_amount"].as_f64(), Some(950.0));

    let (status, _) =
        send(&app.router, Method::POST, "/v1/payments/online/complete", Some(signal), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, orders) = send(&app.router, Method::GET, "/v1/orders?user_id=user-42", None, None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_total_must_match_quote() {
    let app = test_app();

    let (status, err) = send(&app.router, Method::POST, "/v1/orders", Some(draft(1.0)), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("total_amount"));

    // Online pays the discounted total, not the cart total.
    let (status, _) =
        send(&app.router, Method::POST, "/v1/payments/online", Some(draft(1000.0)), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.state.checkout.pending_count(), 0);

    let (_, orders) = send(&app.router, Method::GET, "/v1/orders?user_id=user-42", None, None).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_online_checkout_creates_nothing() {
    let app = test_app();
    let (_, started) =
        send(&app.router, Method::POST, "/v1/payments/online", Some(draft(950.0)), None).await;
    let reference = started["initiation"]["reference"].as_str().unwrap();

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/payments/online/complete",
        Some(json!({ "reference": reference, "outcome": "cancelled" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(app.courier.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_gateway_is_rejected() {
    let app = test_app();
    let (status, err) =
        send(&app.router, Method::POST, "/v1/payments/redirect", Some(draft(1000.0)), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("redirect"));
}

#[tokio::test]
async fn test_metrics_follow_order_events() {
    let app = test_app();
    place_cod_order(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("bazaar_orders_created_total 1"));
    assert!(text.contains("bazaar_fulfillment_created_total 1"));
}

#[tokio::test]
async fn test_sweep_advances_in_flight_orders() {
    let app = test_app();
    let first = place_cod_order(&app).await;
    let second = place_cod_order(&app).await;
    {
        let mut tracking = app.courier.tracking.lock().unwrap();
        tracking.insert(first["awb_code"].as_str().unwrap().to_string(), "Delivered".to_string());
        tracking.insert(second["awb_code"].as_str().unwrap().to_string(), "Some New Status".to_string());
    }

    let advanced = worker::sweep(&app.state, 50).await.unwrap();
    assert_eq!(advanced, 1);

    let (_, delivered) = send(
        &app.router,
        Method::GET,
        &format!("/v1/orders/{}", first["id"].as_str().unwrap()),
        None,
        None,
    )
    .await;
    assert_eq!(delivered["tracking_status"], "Delivered");
}
