//! Payment adapters for each checkout method and the coordinator that turns
//! a confirmed payment into a persisted order.

pub mod coordinator;
pub mod deferred;
pub mod hosted;
pub mod redirect;

pub use coordinator::{CheckoutCoordinator, CheckoutStarted};
pub use deferred::DeferredSettlement;
pub use hosted::{HostedCheckoutGateway, HostedGatewayConfig};
pub use redirect::{RedirectGatewayConfig, SignedRedirectGateway};
