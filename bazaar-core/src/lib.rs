pub mod order;
pub mod repository;
pub mod payment;
pub mod courier;
pub mod events;

pub use order::{
    Address, Customer, LineItem, Order, OrderDraft, PaymentMethod, PaymentStatus, ShipmentRef,
    TrackingStatus, TrackingWrite,
};
pub use repository::{OrderStore, StoreError, StoreResult};
pub use courier::{DisabledCourier, FulfillmentClient, FulfillmentError};
pub use payment::{PaymentAdapter, PaymentError};
pub use events::{EventSink, LogEventSink};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Validation failed: missing or invalid {}", .0.join(", "))]
    ValidationError(Vec<String>),
    #[error("Unrecognised value: {0}")]
    ParseError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
