use std::sync::Arc;

use bazaar_core::{EventSink, FulfillmentClient, OrderStore, PaymentAdapter};
use bazaar_order::payment::DeferredSettlement;
use bazaar_order::{CheckoutCoordinator, OrderOrchestrator, PricingConfig, PricingEngine, StatusReconciler};
use bazaar_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone, Copy)]
pub struct RateLimitConfig {
    pub limit: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_seconds: 60,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderOrchestrator>,
    pub reconciler: Arc<StatusReconciler>,
    pub checkout: Arc<CheckoutCoordinator>,
    pub pricing: Arc<PricingEngine>,
    /// No Redis configured → requests are never throttled.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
}

/// Everything the binary (or a test) decides before the state is assembled.
pub struct Wiring {
    pub store: Arc<dyn OrderStore>,
    pub courier: Arc<dyn FulfillmentClient>,
    /// Extra event sinks; the metrics sink is always added.
    pub sinks: Vec<Arc<dyn EventSink>>,
    /// Online gateways. Cash on delivery is always available.
    pub gateways: Vec<Arc<dyn PaymentAdapter>>,
    pub pricing: PricingConfig,
    pub currency: String,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn assemble(wiring: Wiring) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);

        let mut sinks = wiring.sinks;
        sinks.push(metrics.clone());
        let events: Arc<dyn EventSink> = Arc::new(sinks);

        let orders = Arc::new(OrderOrchestrator::new(wiring.store, wiring.courier, events));
        let reconciler = Arc::new(orders.reconciler());
        let pricing = Arc::new(PricingEngine::new(wiring.pricing));

        let checkout = wiring
            .gateways
            .into_iter()
            .fold(
                CheckoutCoordinator::new(orders.clone(), pricing.clone(), wiring.currency)
                    .with_adapter(Arc::new(DeferredSettlement)),
                |coordinator, gateway| coordinator.with_adapter(gateway),
            );

        Ok(Self {
            orders,
            reconciler,
            checkout: Arc::new(checkout),
            pricing,
            redis: wiring.redis,
            rate_limit: wiring.rate_limit,
            metrics,
            auth: wiring.auth,
        })
    }
}
