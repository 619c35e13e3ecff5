//! HTTP implementation of [`bazaar_core::FulfillmentClient`] for the courier
//! aggregator's REST API.

pub mod client;
pub mod payload;
pub mod session;

pub use client::{CourierConfig, HttpCourierClient};
pub use payload::{build_create_payload, CreateOrderPayload, PackageSpec};
pub use session::{CourierSession, SessionToken};
