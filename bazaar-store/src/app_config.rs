use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingSettings,
    /// Absent → courier calls are disabled and every order stays unshipped
    /// until an admin retries fulfillment.
    pub courier: Option<CourierSettings>,
    #[serde(default)]
    pub payments: PaymentSettings,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Unset → orders are kept in memory.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: i64,
    #[serde(default = "default_rate_window")]
    pub rate_window_seconds: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            rate_limit: default_rate_limit(),
            rate_window_seconds: default_rate_window(),
        }
    }
}

fn default_rate_limit() -> i64 {
    100
}

fn default_rate_window() -> i64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSettings {
    pub tax_rate: Decimal,
    pub online_discount_rate: Decimal,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            online_discount_rate: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CourierSettings {
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub pickup_location: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub package: PackageSettings,
}

fn default_token_ttl_hours() -> i64 {
    240
}

fn default_request_timeout() -> u64 {
    15
}

/// Declared parcel size sent with every shipment.
#[derive(Debug, Deserialize, Clone)]
pub struct PackageSettings {
    pub length_cm: Decimal,
    pub breadth_cm: Decimal,
    pub height_cm: Decimal,
    pub weight_kg: Decimal,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            length_cm: Decimal::new(10, 0),
            breadth_cm: Decimal::new(10, 0),
            height_cm: Decimal::new(10, 0),
            weight_kg: Decimal::new(5, 1),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentSettings {
    #[serde(default = "default_currency")]
    pub currency: String,
    pub hosted: Option<HostedPaymentSettings>,
    pub redirect: Option<RedirectPaymentSettings>,
    /// Unfinished online checkouts older than this are dropped.
    #[serde(default = "default_checkout_ttl")]
    pub checkout_ttl_minutes: i64,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            hosted: None,
            redirect: None,
            checkout_ttl_minutes: default_checkout_ttl(),
        }
    }
}

fn default_currency() -> String {
    "INR".into()
}

fn default_checkout_ttl() -> i64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostedPaymentSettings {
    pub key_id: String,
    pub key_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedirectPaymentSettings {
    pub base_url: String,
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: u32,
    pub redirect_url: String,
    pub callback_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcilerSettings {
    /// 0 disables the periodic sweep; syncs then only run on demand.
    #[serde(default)]
    pub interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `BAZAAR__COURIER__PASSWORD=...`
            .add_source(config::Environment::with_prefix("BAZAAR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
