use async_trait::async_trait;
use bazaar_core::payment::{
    to_minor_units, CheckoutParams, CompletionSignal, PaymentInitiation, PaymentOutcome,
    PaymentRequest, PendingPayment,
};
use bazaar_core::{PaymentAdapter, PaymentError, PaymentMethod};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct HostedGatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    pub callback_url: String,
}

/// Hosted checkout: the browser opens the gateway widget with the params we
/// return, and comes back with a payment id plus an HMAC-SHA256 signature
/// over `"{reference}|{payment_id}"` keyed with the merchant secret.
pub struct HostedCheckoutGateway {
    config: HostedGatewayConfig,
}

impl HostedCheckoutGateway {
    pub fn new(config: HostedGatewayConfig) -> Self {
        Self { config }
    }

    /// Hex signature the gateway attaches to a successful payment.
    pub fn sign(&self, reference: &str, payment_id: &str) -> Result<String, PaymentError> {
        let mac = self.mac(reference, payment_id)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, reference: &str, payment_id: &str, signature: &str) -> Result<(), PaymentError> {
        let sig_bytes = hex::decode(signature.trim()).map_err(|_| PaymentError::SignatureMismatch)?;
        self.mac(reference, payment_id)?
            .verify_slice(&sig_bytes)
            .map_err(|_| PaymentError::SignatureMismatch)
    }

    fn mac(&self, reference: &str, payment_id: &str) -> Result<HmacSha256, PaymentError> {
        let mut mac = HmacSha256::new_from_slice(self.config.key_secret.as_bytes())
            .map_err(|_| PaymentError::MalformedResponse("HMAC key error".to_string()))?;
        mac.update(format!("{}|{}", reference, payment_id).as_bytes());
        Ok(mac)
    }
}

#[async_trait]
impl PaymentAdapter for HostedCheckoutGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Online
    }

    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, PaymentError> {
        let amount_minor = to_minor_units(request.amount)?;
        Ok(PaymentInitiation::Checkout(CheckoutParams {
            key_id: self.config.key_id.clone(),
            amount_minor,
            currency: self.config.currency.clone(),
            reference: request.reference.clone(),
            callback_url: self.config.callback_url.clone(),
            prefill_name: request.customer_name.clone(),
            prefill_contact: request.customer_mobile.clone(),
        }))
    }

    async fn complete(
        &self,
        pending: &PendingPayment,
        signal: CompletionSignal,
    ) -> Result<PaymentOutcome, PaymentError> {
        match signal {
            CompletionSignal::Success {
                payment_id,
                signature,
            } => {
                let signature = signature.ok_or(PaymentError::SignatureMismatch)?;
                if let Err(e) = self.verify(&pending.reference, &payment_id, &signature) {
                    warn!(reference = %pending.reference, "Hosted checkout signature mismatch");
                    return Err(e);
                }
                info!(reference = %pending.reference, payment_id = %payment_id, "Hosted payment verified");
                Ok(PaymentOutcome {
                    payment_reference: payment_id,
                })
            }
            CompletionSignal::Cancelled => Err(PaymentError::Cancelled),
            CompletionSignal::Failed { reason } => Err(PaymentError::Declined(reason)),
        }
    }
}
