use bazaar_core::{
    Address, Customer, LineItem, Order, OrderDraft, OrderStore, PaymentStatus, ShipmentRef,
    StoreError, TrackingStatus, TrackingWrite,
};
use bazaar_shared::Masked;
use bazaar_store::MemoryOrderStore;
use chrono::Duration;
use rstest::rstest;
use rust_decimal::Decimal;
use std::sync::Arc;

fn order_for(user: &str) -> Order {
    Order::from_draft(OrderDraft {
        customer: Customer {
            name: "Ravi Kumar".to_string(),
            mobile: Masked("9000000001".to_string()),
            email: None,
        },
        address: Address {
            state: "Karnataka".to_string(),
            district: "Bengaluru Urban".to_string(),
            place: "Indiranagar".to_string(),
            house_address: "44 CMH Road".to_string(),
            landmark: None,
            pincode: Some("560038".to_string()),
        },
        items: vec![LineItem {
            product_id: "sku-9".to_string(),
            name: "Cotton Saree".to_string(),
            price: Decimal::new(2450, 0),
            quantity: 1,
            image: None,
            size: None,
            note: None,
        }],
        total_amount: Decimal::new(2450, 0),
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
        user_id: Some(user.to_string()),
    })
}

#[tokio::test]
async fn test_insert_and_get() {
    let store = MemoryOrderStore::new();
    let order = order_for("u1");
    store.insert(&order).await.unwrap();

    let fetched = store.get(order.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, order.id);
    assert_eq!(fetched.tracking_status, TrackingStatus::OrderPlaced);

    assert!(matches!(
        store.insert(&order).await,
        Err(StoreError::Duplicate(_))
    ));
}

#[tokio::test]
async fn test_lists_are_newest_first() {
    let store = MemoryOrderStore::new();
    let mut older = order_for("u1");
    older.created_at = older.created_at - Duration::minutes(5);
    let newer = order_for("u1");
    let someone_else = order_for("u2");
    for o in [&older, &newer, &someone_else] {
        store.insert(o).await.unwrap();
    }

    let mine = store.list_for_user("u1").await.unwrap();
    assert_eq!(mine.iter().map(|o| o.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

    let recent = store.list_recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_ne!(recent[1].id, older.id);
}

#[tokio::test]
async fn test_write_tracking_is_compare_and_set() {
    let store = MemoryOrderStore::new();
    let order = order_for("u1");
    store.insert(&order).await.unwrap();

    let packed = store
        .write_tracking(order.id, TrackingStatus::OrderPlaced, &TrackingWrite::status(TrackingStatus::Packed))
        .await
        .unwrap();
    assert_eq!(packed.tracking_status, TrackingStatus::Packed);

    // Stale expectation loses.
    let stale = store
        .write_tracking(order.id, TrackingStatus::OrderPlaced, &TrackingWrite::status(TrackingStatus::Cancelled))
        .await;
    assert!(matches!(
        stale,
        Err(StoreError::Conflict { expected: TrackingStatus::OrderPlaced, actual: TrackingStatus::Packed, .. })
    ));
}

#[rstest]
#[case::matching_expectation(TrackingStatus::Packed, TrackingStatus::Shipped, None)]
#[case::stale_expectation(TrackingStatus::OrderPlaced, TrackingStatus::Shipped, Some(TrackingStatus::Packed))]
#[case::stale_cancel(TrackingStatus::Shipped, TrackingStatus::Cancelled, Some(TrackingStatus::Packed))]
#[tokio::test]
async fn test_cas_outcome(
    #[case] expected: TrackingStatus,
    #[case] next: TrackingStatus,
    #[case] conflict_with: Option<TrackingStatus>,
) {
    let store = MemoryOrderStore::new();
    let order = order_for("u1");
    store.insert(&order).await.unwrap();
    store
        .write_tracking(order.id, TrackingStatus::OrderPlaced, &TrackingWrite::status(TrackingStatus::Packed))
        .await
        .unwrap();

    let result = store.write_tracking(order.id, expected, &TrackingWrite::status(next)).await;
    let persisted = store.get(order.id).await.unwrap().unwrap().tracking_status;
    match conflict_with {
        None => {
            assert_eq!(result.unwrap().tracking_status, next);
            assert_eq!(persisted, next);
        }
        Some(actual) => {
            assert!(matches!(
                result,
                Err(StoreError::Conflict { expected: e, actual: a, .. }) if e == expected && a == actual
            ));
            assert_eq!(persisted, TrackingStatus::Packed);
        }
    }
}

#[tokio::test]
async fn test_concurrent_cas_has_one_winner() {
    let store = Arc::new(MemoryOrderStore::new());
    let order = order_for("u1");
    store.insert(&order).await.unwrap();

    let id = order.id;
    let mut handles = Vec::new();
    for next in [TrackingStatus::Packed, TrackingStatus::Shipped, TrackingStatus::Cancelled] {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .write_tracking(id, TrackingStatus::OrderPlaced, &TrackingWrite::status(next))
                .await
                .is_ok()
        }));
    }
    let mut wins = 0;
    for h in handles {
        if h.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_none_fields_keep_existing_values() {
    let store = MemoryOrderStore::new();
    let order = order_for("u1");
    store.insert(&order).await.unwrap();

    let write = TrackingWrite {
        status: TrackingStatus::Packed,
        tracking_id: Some("TRK-1".to_string()),
        cancellation_reason: None,
    };
    store.write_tracking(order.id, TrackingStatus::OrderPlaced, &write).await.unwrap();
    let shipped = store
        .write_tracking(order.id, TrackingStatus::Packed, &TrackingWrite::status(TrackingStatus::Shipped))
        .await
        .unwrap();
    assert_eq!(shipped.tracking_id.as_deref(), Some("TRK-1"));
}

#[tokio::test]
async fn test_shipment_and_payment_updates() {
    let store = MemoryOrderStore::new();
    let order = order_for("u1");
    store.insert(&order).await.unwrap();

    let shipped = store
        .record_shipment(
            order.id,
            &ShipmentRef {
                fulfillment_order_id: "SR-1".to_string(),
                fulfillment_shipment_id: "SH-1".to_string(),
                awb_code: Some("AWB1".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(shipped.has_shipment());
    assert_eq!(shipped.awb_code.as_deref(), Some("AWB1"));

    let paid = store
        .set_payment(order.id, PaymentStatus::Paid, Some("pay_1"))
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("pay_1"));

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        store.set_payment(missing, PaymentStatus::Paid, None).await,
        Err(StoreError::NotFound(id)) if id == missing
    ));
}
