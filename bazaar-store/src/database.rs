use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::PricingSettings;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Operator overrides from `pricing_rules` (`{"value": "0.18"}` rows)
    /// layered over the file configuration.
    pub async fn fetch_pricing_rules(
        &self,
        defaults: PricingSettings,
    ) -> Result<PricingSettings, sqlx::Error> {
        let rows: Vec<(String, serde_json::Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM pricing_rules")
                .fetch_all(&self.pool)
                .await?;

        Ok(apply_pricing_rules(defaults, rows))
    }
}

fn apply_pricing_rules(
    mut rules: PricingSettings,
    rows: Vec<(String, serde_json::Value)>,
) -> PricingSettings {
    for (key, value) in rows {
        let parsed = value.get("value").and_then(|v| match v {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        });
        let Some(rate) = parsed else {
            warn!(rule = %key, "Ignoring pricing rule with unreadable value");
            continue;
        };
        match key.as_str() {
            "tax_rate" => rules.tax_rate = rate,
            "online_discount_rate" => rules.online_discount_rate = rate,
            other => warn!(rule = %other, "Unknown pricing rule"),
        }
    }
    rules
}
