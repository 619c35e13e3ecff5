pub mod locks;
pub mod manager;
pub mod orchestrator;
pub mod payment;
pub mod pricing;
pub mod reconciler;

pub use locks::OrderLocks;
pub use manager::{check_transition, OrderError, TransitionError, TransitionKind};
pub use orchestrator::OrderOrchestrator;
pub use payment::{CheckoutCoordinator, CheckoutStarted};
pub use pricing::{PriceBreakdown, PricingConfig, PricingEngine};
pub use reconciler::{map_external_status, StatusReconciler, SyncOutcome};
