#![allow(dead_code)]

use async_trait::async_trait;
use bazaar_core::{
    Address, Customer, EventSink, FulfillmentClient, FulfillmentError, LineItem, Order,
    OrderDraft, PaymentStatus, ShipmentRef,
};
use bazaar_order::OrderOrchestrator;
use bazaar_shared::models::events::OrderEvent;
use bazaar_store::MemoryOrderStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Succeed,
    Fail,
    Panic,
}

/// Scripted courier: creation behaviour and per-AWB tracking answers are set
/// by the test.
pub struct ScriptedCourier {
    pub create_mode: Mutex<CreateMode>,
    pub tracking: Mutex<HashMap<String, Result<Option<String>, String>>>,
    pub fail_cancel: Mutex<bool>,
    pub creates: AtomicUsize,
    pub cancels: Mutex<Vec<String>>,
}

impl ScriptedCourier {
    pub fn new(mode: CreateMode) -> Arc<Self> {
        Arc::new(Self {
            create_mode: Mutex::new(mode),
            tracking: Mutex::new(HashMap::new()),
            fail_cancel: Mutex::new(false),
            creates: AtomicUsize::new(0),
            cancels: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: CreateMode) {
        *self.create_mode.lock().unwrap() = mode;
    }

    pub fn set_tracking(&self, awb: &str, status: Option<&str>) {
        self.tracking
            .lock()
            .unwrap()
            .insert(awb.to_string(), Ok(status.map(String::from)));
    }

    pub fn set_tracking_error(&self, awb: &str) {
        self.tracking
            .lock()
            .unwrap()
            .insert(awb.to_string(), Err("connection reset".to_string()));
    }
}

#[async_trait]
impl FulfillmentClient for ScriptedCourier {
    async fn create_shipment(&self, order: &Order) -> Result<ShipmentRef, FulfillmentError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let mode = *self.create_mode.lock().unwrap();
        match mode {
            CreateMode::Succeed => Ok(ShipmentRef {
                fulfillment_order_id: format!("SR-{}", n),
                fulfillment_shipment_id: format!("SH-{}", n),
                awb_code: Some(format!("AWB-{}", order.id.simple())),
            }),
            CreateMode::Fail => Err(FulfillmentError::Unreachable("courier down".to_string())),
            CreateMode::Panic => panic!("courier client bug"),
        }
    }

    async fn get_tracking(&self, awb_code: &str) -> Result<Option<String>, FulfillmentError> {
        match self.tracking.lock().unwrap().get(awb_code).cloned() {
            Some(Ok(status)) => Ok(status),
            Some(Err(e)) => Err(FulfillmentError::Unreachable(e)),
            None => Ok(None),
        }
    }

    async fn cancel_shipment(&self, fulfillment_order_id: &str) -> Result<(), FulfillmentError> {
        self.cancels
            .lock()
            .unwrap()
            .push(fulfillment_order_id.to_string());
        if *self.fail_cancel.lock().unwrap() {
            return Err(FulfillmentError::Rejected {
                status: 400,
                body: "already manifested".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<OrderEvent>>,
}

impl RecordingSink {
    pub fn topics(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.topic()).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: OrderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub store: Arc<MemoryOrderStore>,
    pub courier: Arc<ScriptedCourier>,
    pub events: Arc<RecordingSink>,
    pub orchestrator: Arc<OrderOrchestrator>,
}

pub fn harness(mode: CreateMode) -> Harness {
    let store = Arc::new(MemoryOrderStore::new());
    let courier = ScriptedCourier::new(mode);
    let events = Arc::new(RecordingSink::default());
    let orchestrator = Arc::new(OrderOrchestrator::new(
        store.clone(),
        courier.clone(),
        events.clone(),
    ));
    Harness {
        store,
        courier,
        events,
        orchestrator,
    }
}

pub fn draft() -> OrderDraft {
    OrderDraft {
        customer: Customer {
            name: "Fathima Rahman".to_string(),
            mobile: "9447000000".to_string().into(),
            email: Some("fathima@example.com".to_string().into()),
        },
        address: Address {
            state: "Kerala".to_string(),
            district: "Kozhikode".to_string(),
            place: "Feroke".to_string(),
            house_address: "Rahmath Manzil".to_string(),
            landmark: Some("Opp. Post Office".to_string()),
            pincode: Some("673631".to_string()),
        },
        items: vec![LineItem {
            product_id: "sku-100".to_string(),
            name: "Printed Maxi".to_string(),
            price: Decimal::new(1299, 0),
            quantity: 1,
            image: None,
            size: Some("L".to_string()),
            note: None,
        }],
        total_amount: Decimal::new(1299, 0),
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
        user_id: Some("user-42".to_string()),
    }
}
