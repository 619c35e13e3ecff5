use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bazaar_api::{
    app,
    state::{AppState, AuthConfig, RateLimitConfig, Wiring},
    worker,
};
use bazaar_core::{DisabledCourier, EventSink, FulfillmentClient, LogEventSink, OrderStore, PaymentAdapter};
use bazaar_courier::{CourierConfig, HttpCourierClient, PackageSpec};
use bazaar_order::payment::{
    HostedCheckoutGateway, HostedGatewayConfig, RedirectGatewayConfig, SignedRedirectGateway,
};
use bazaar_order::PricingConfig;
use bazaar_store::app_config::{Config, CourierSettings, PricingSettings};
use bazaar_store::{DbClient, MemoryOrderStore, PgOrderStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_api=debug,bazaar_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Bazaar API on port {}", config.server.port);

    // Storage
    let (store, pricing): (Arc<dyn OrderStore>, PricingSettings) = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let pricing = match db.fetch_pricing_rules(config.pricing.clone()).await {
                Ok(rules) => rules,
                Err(e) => {
                    tracing::warn!(error = %e, "Pricing rules unavailable, using file configuration");
                    config.pricing.clone()
                }
            };
            (Arc::new(PgOrderStore::new(db.pool.clone())), pricing)
        }
        None => {
            tracing::warn!("No database configured, orders are kept in memory");
            (Arc::new(MemoryOrderStore::new()), config.pricing.clone())
        }
    };

    // Courier
    let courier: Arc<dyn FulfillmentClient> = match &config.courier {
        Some(settings) => Arc::new(
            HttpCourierClient::new(courier_config(settings)).context("Failed to build courier client")?,
        ),
        None => {
            tracing::warn!("Courier not configured, shipments will not be created");
            Arc::new(DisabledCourier)
        }
    };

    // Redis Connection
    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(
            RedisClient::new(url).await.context("Failed to connect to Redis")?,
        )),
        None => None,
    };

    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogEventSink)];
    if let Some(kafka) = kafka_sink(&config)? {
        sinks.push(kafka);
    }

    let payments = &config.payments;
    let mut gateways: Vec<Arc<dyn PaymentAdapter>> = Vec::new();
    if let Some(hosted) = &payments.hosted {
        gateways.push(Arc::new(HostedCheckoutGateway::new(HostedGatewayConfig {
            key_id: hosted.key_id.clone(),
            key_secret: hosted.key_secret.clone(),
            currency: payments.currency.clone(),
            callback_url: hosted.callback_url.clone(),
        })));
    }
    if let Some(redirect) = &payments.redirect {
        let gateway = SignedRedirectGateway::new(RedirectGatewayConfig {
            base_url: redirect.base_url.clone(),
            merchant_id: redirect.merchant_id.clone(),
            salt_key: redirect.salt_key.clone(),
            salt_index: redirect.salt_index,
            redirect_url: redirect.redirect_url.clone(),
            callback_url: redirect.callback_url.clone(),
            request_timeout_secs: redirect.request_timeout_secs,
        })
        .context("Failed to build redirect gateway")?;
        gateways.push(Arc::new(gateway));
    }

    let app_state = AppState::assemble(Wiring {
        store,
        courier,
        sinks,
        gateways,
        pricing: PricingConfig {
            tax_rate: pricing.tax_rate,
            online_discount_rate: pricing.online_discount_rate,
        },
        currency: payments.currency.clone(),
        redis,
        rate_limit: RateLimitConfig {
            limit: config.redis.rate_limit,
            window_seconds: config.redis.rate_window_seconds,
        },
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    })?;

    if config.reconciler.interval_secs > 0 {
        tokio::spawn(worker::start_reconcile_worker(
            app_state.clone(),
            Duration::from_secs(config.reconciler.interval_secs),
            config.reconciler.batch_size,
            chrono::Duration::minutes(payments.checkout_ttl_minutes),
        ));
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    ).await?;

    Ok(())
}

fn courier_config(settings: &CourierSettings) -> CourierConfig {
    CourierConfig {
        base_url: settings.base_url.clone(),
        email: settings.email.clone(),
        password: settings.password.clone(),
        pickup_location: settings.pickup_location.clone(),
        token_ttl: chrono::Duration::hours(settings.token_ttl_hours),
        request_timeout: Duration::from_secs(settings.request_timeout_secs),
        package: PackageSpec {
            length_cm: settings.package.length_cm,
            breadth_cm: settings.package.breadth_cm,
            height_cm: settings.package.height_cm,
            weight_kg: settings.package.weight_kg,
        },
    }
}

#[cfg(feature = "kafka")]
fn kafka_sink(config: &Config) -> anyhow::Result<Option<Arc<dyn EventSink>>> {
    let Some(brokers) = &config.kafka.brokers else {
        return Ok(None);
    };
    let producer = bazaar_store::EventProducer::new(brokers).context("Failed to create Kafka producer")?;
    tracing::info!("Publishing order events to Kafka at {}", brokers);
    Ok(Some(Arc::new(producer)))
}

#[cfg(not(feature = "kafka"))]
fn kafka_sink(config: &Config) -> anyhow::Result<Option<Arc<dyn EventSink>>> {
    if config.kafka.brokers.is_some() {
        tracing::warn!("kafka.brokers is set but this build has no Kafka support");
    }
    Ok(None)
}
