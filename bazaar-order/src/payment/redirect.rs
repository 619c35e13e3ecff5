use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bazaar_core::payment::{
    to_minor_units, CompletionSignal, PaymentInitiation, PaymentOutcome, PaymentRequest,
    PendingPayment,
};
use bazaar_core::{PaymentAdapter, PaymentError, PaymentMethod};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, warn};

const PAY_PATH: &str = "/pg/v1/pay";

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectGatewayConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: u32,
    /// Where the gateway sends the customer's browser afterwards.
    pub redirect_url: String,
    /// Server-to-server notification URL.
    pub callback_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: &'a str,
    amount: i64,
    redirect_url: &'a str,
    redirect_mode: &'a str,
    callback_url: &'a str,
    mobile_number: &'a str,
    payment_instrument: PaymentInstrument,
}

#[derive(Debug, Serialize)]
struct PaymentInstrument {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
struct RedirectInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    transaction_id: Option<String>,
}

/// Signed-request gateway: the payload travels base64-encoded, every call
/// carries an `X-VERIFY` checksum, and the customer is sent to a hosted
/// payment page. Completion is never trusted from the browser alone; it is
/// confirmed against the gateway's status endpoint.
pub struct SignedRedirectGateway {
    config: RedirectGatewayConfig,
    http: reqwest::Client,
}

impl SignedRedirectGateway {
    pub fn new(config: RedirectGatewayConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PaymentError::GatewayUnreachable(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// `sha256(parts.. + salt_key)` hex, suffixed with `###{salt_index}`.
    pub fn checksum(&self, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hasher.update(self.config.salt_key.as_bytes());
        format!("{}###{}", hex::encode(hasher.finalize()), self.config.salt_index)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Base64 payload plus its checksum, as sent to the pay endpoint.
    pub fn encode_request(&self, request: &PaymentRequest) -> Result<(String, String), PaymentError> {
        let amount = to_minor_units(request.amount)?;
        let body = PayRequest {
            merchant_id: &self.config.merchant_id,
            merchant_transaction_id: &request.reference,
            merchant_user_id: request.user_id.as_deref().unwrap_or("guest"),
            amount,
            redirect_url: &self.config.redirect_url,
            redirect_mode: "POST",
            callback_url: &self.config.callback_url,
            mobile_number: &request.customer_mobile,
            payment_instrument: PaymentInstrument { kind: "PAY_PAGE" },
        };
        let json = serde_json::to_vec(&body)
            .map_err(|e| PaymentError::MalformedResponse(e.to_string()))?;
        let encoded = STANDARD.encode(json);
        let checksum = self.checksum(&[&encoded, PAY_PATH]);
        Ok((encoded, checksum))
    }

    async fn confirm(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
        let path = format!("/pg/v1/status/{}/{}", self.config.merchant_id, reference);
        let response = self
            .http
            .get(self.url(&path))
            .header("X-VERIFY", self.checksum(&[&path]))
            .header("X-MERCHANT-ID", &self.config.merchant_id)
            .send()
            .await
            .map_err(|e| PaymentError::GatewayUnreachable(e.to_string()))?;

        let body: GatewayResponse<StatusData> = response
            .json()
            .await
            .map_err(|e| PaymentError::MalformedResponse(e.to_string()))?;

        match body.code.as_str() {
            "PAYMENT_SUCCESS" if body.success => {
                let payment_reference = body
                    .data
                    .and_then(|d| d.transaction_id)
                    .unwrap_or_else(|| reference.to_string());
                info!(reference = %reference, transaction_id = %payment_reference, "Redirect payment confirmed");
                Ok(PaymentOutcome { payment_reference })
            }
            "PAYMENT_PENDING" => {
                info!(reference = %reference, "Redirect payment still pending");
                Err(PaymentError::Pending)
            }
            code => {
                warn!(reference = %reference, code = %code, message = %body.message, "Redirect payment not successful");
                Err(PaymentError::Declined(if body.message.is_empty() {
                    code.to_string()
                } else {
                    body.message
                }))
            }
        }
    }
}

#[async_trait]
impl PaymentAdapter for SignedRedirectGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Redirect
    }

    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, PaymentError> {
        let (encoded, checksum) = self.encode_request(request)?;

        let response = self
            .http
            .post(self.url(PAY_PATH))
            .header("X-VERIFY", checksum)
            .json(&serde_json::json!({ "request": encoded }))
            .send()
            .await
            .map_err(|e| PaymentError::GatewayUnreachable(e.to_string()))?;

        let status = response.status();
        let body: GatewayResponse<PayData> = response
            .json()
            .await
            .map_err(|e| PaymentError::MalformedResponse(format!("{} ({})", e, status)))?;

        if !body.success {
            warn!(reference = %request.reference, code = %body.code, "Redirect gateway refused payment");
            return Err(PaymentError::Declined(body.message));
        }

        let url = body
            .data
            .and_then(|d| d.instrument_response)
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .ok_or_else(|| PaymentError::MalformedResponse("missing redirect url".to_string()))?;

        Ok(PaymentInitiation::Redirect {
            url,
            reference: request.reference.clone(),
        })
    }

    async fn complete(
        &self,
        pending: &PendingPayment,
        signal: CompletionSignal,
    ) -> Result<PaymentOutcome, PaymentError> {
        match signal {
            CompletionSignal::Success { .. } => self.confirm(&pending.reference).await,
            CompletionSignal::Cancelled => Err(PaymentError::Cancelled),
            CompletionSignal::Failed { reason } => Err(PaymentError::Declined(reason)),
        }
    }
}
