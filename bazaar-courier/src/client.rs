use async_trait::async_trait;
use bazaar_core::{FulfillmentClient, FulfillmentError, Order, ShipmentRef};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::payload::{build_create_payload, PackageSpec};
use crate::session::CourierSession;

#[derive(Debug, Clone)]
pub struct CourierConfig {
    /// API root, e.g. `https://apiv2.courier.example/v1/external`.
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub pickup_location: String,
    pub token_ttl: chrono::Duration,
    pub request_timeout: Duration,
    pub package: PackageSpec,
}

/// Courier REST client. Logs in lazily, reuses the token until it expires or
/// is rejected, and retries a rejected call exactly once after re-login.
pub struct HttpCourierClient {
    config: CourierConfig,
    http: reqwest::Client,
    session: CourierSession,
}

fn unreachable(err: reqwest::Error) -> FulfillmentError {
    FulfillmentError::Unreachable(err.to_string())
}

/// Courier ids come back as numbers or strings depending on the endpoint.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn expect_success(response: Response) -> Result<Value, FulfillmentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FulfillmentError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| FulfillmentError::MalformedResponse(e.to_string()))
}

impl HttpCourierClient {
    pub fn new(config: CourierConfig) -> Result<Self, FulfillmentError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(unreachable)?;
        let session = CourierSession::new(config.token_ttl);
        Ok(Self {
            config,
            http,
            session,
        })
    }

    pub fn session(&self) -> &CourierSession {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn login(&self) -> Result<String, FulfillmentError> {
        debug!("Logging in to courier API");
        let response = self
            .http
            .post(self.url("auth/login"))
            .json(&json!({ "email": self.config.email, "password": self.config.password }))
            .send()
            .await
            .map_err(unreachable)?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!("Courier rejected login credentials");
            return Err(FulfillmentError::Unauthorized);
        }
        let body = expect_success(response).await?;
        body["token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(String::from)
            .ok_or_else(|| FulfillmentError::MalformedResponse(format!("login without token: {body}")))
    }

    /// Sends a bearer-authenticated request, re-authenticating once on 401.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, FulfillmentError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.session.token(|| self.login()).await?;
        let response = build(&token.value).send().await.map_err(unreachable)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(generation = token.generation, "Courier token rejected, re-authenticating");
        self.session.invalidate(token.generation).await;

        let retry_token = self.session.token(|| self.login()).await?;
        let response = build(&retry_token.value).send().await.map_err(unreachable)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.invalidate(retry_token.generation).await;
            return Err(FulfillmentError::Unauthorized);
        }
        Ok(response)
    }
}

#[async_trait]
impl FulfillmentClient for HttpCourierClient {
    async fn create_shipment(&self, order: &Order) -> Result<ShipmentRef, FulfillmentError> {
        let payload = build_create_payload(order, &self.config.pickup_location, &self.config.package);
        let url = self.url("orders/create/adhoc");

        let response = self
            .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&payload))
            .await?;
        let body = expect_success(response).await?;

        let fulfillment_order_id = id_string(&body["order_id"]).ok_or_else(|| {
            FulfillmentError::MalformedResponse(format!("create without order_id: {body}"))
        })?;
        let fulfillment_shipment_id = id_string(&body["shipment_id"]).ok_or_else(|| {
            FulfillmentError::MalformedResponse(format!("create without shipment_id: {body}"))
        })?;
        let awb_code = id_string(&body["awb_code"]);

        info!(
            order_id = %order.id,
            fulfillment_order_id = %fulfillment_order_id,
            awb = ?awb_code,
            "Courier order created"
        );
        Ok(ShipmentRef {
            fulfillment_order_id,
            fulfillment_shipment_id,
            awb_code,
        })
    }

    async fn get_tracking(&self, awb_code: &str) -> Result<Option<String>, FulfillmentError> {
        let url = self.url(&format!("courier/track/awb/{}", awb_code));
        let response = self
            .send_authorized(|token| self.http.get(&url).bearer_auth(token))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = expect_success(response).await?;

        let tracking = &body["tracking_data"];
        let status = tracking["shipment_track"]
            .as_array()
            .and_then(|tracks| tracks.first())
            .and_then(|track| track["current_status"].as_str())
            .or_else(|| tracking["current_status"].as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        debug!(awb = %awb_code, status = ?status, "Courier tracking fetched");
        Ok(status)
    }

    async fn cancel_shipment(&self, fulfillment_order_id: &str) -> Result<(), FulfillmentError> {
        let id = fulfillment_order_id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(fulfillment_order_id));
        let body = json!({ "ids": [id] });
        let url = self.url("orders/cancel");

        let response = self
            .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&body))
            .await?;
        expect_success(response).await?;
        info!(fulfillment_order_id = %fulfillment_order_id, "Courier order cancelled");
        Ok(())
    }
}
