use bazaar_core::payment::{CompletionSignal, PaymentInitiation, PaymentRequest, PendingPayment};
use bazaar_core::{Order, OrderDraft, PaymentAdapter, PaymentError, PaymentMethod, PaymentStatus};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::manager::OrderError;
use crate::orchestrator::OrderOrchestrator;
use crate::pricing::{cart_total, PricingEngine};

struct PendingCheckout {
    payment: PendingPayment,
    draft: OrderDraft,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutStarted {
    /// No external payment step; the order exists now.
    Placed { order: Box<Order> },
    /// Customer must finish paying; complete with the same reference.
    AwaitingPayment { initiation: PaymentInitiation },
}

/// Drives checkout for every payment method. Online attempts are parked here
/// by reference until the gateway confirms them; only then is an order
/// created, already marked `paid`. The amount charged is always the quoted
/// final total for the cart and method.
pub struct CheckoutCoordinator {
    orchestrator: Arc<OrderOrchestrator>,
    pricing: Arc<PricingEngine>,
    adapters: HashMap<PaymentMethod, Arc<dyn PaymentAdapter>>,
    pending: DashMap<String, PendingCheckout>,
    currency: String,
}

impl CheckoutCoordinator {
    pub fn new(
        orchestrator: Arc<OrderOrchestrator>,
        pricing: Arc<PricingEngine>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            pricing,
            adapters: HashMap::new(),
            pending: DashMap::new(),
            currency: currency.into(),
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PaymentAdapter>) -> Self {
        self.adapters.insert(adapter.method(), adapter);
        self
    }

    pub fn supports(&self, method: PaymentMethod) -> bool {
        self.adapters.contains_key(&method)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn adapter(&self, method: PaymentMethod) -> Result<&Arc<dyn PaymentAdapter>, OrderError> {
        self.adapters.get(&method).ok_or_else(|| {
            OrderError::Validation(vec![format!("payment method '{}' is not enabled", method)])
        })
    }

    /// The draft total must be exactly what the quote asks for this cart.
    fn check_total(&self, method: PaymentMethod, draft: &OrderDraft) -> Result<(), OrderError> {
        let quote = self
            .pricing
            .quote(cart_total(&draft.items), method)
            .map_err(|e| OrderError::Validation(vec![e.to_string()]))?;
        if draft.total_amount != quote.final_total {
            warn!(
                method = %method,
                submitted = %draft.total_amount,
                expected = %quote.final_total,
                "Checkout total does not match quote"
            );
            return Err(OrderError::Validation(vec!["total_amount".to_string()]));
        }
        Ok(())
    }

    pub async fn begin(
        &self,
        method: PaymentMethod,
        mut draft: OrderDraft,
    ) -> Result<CheckoutStarted, OrderError> {
        let adapter = Arc::clone(self.adapter(method)?);

        draft.payment_status = PaymentStatus::Pending;
        draft.payment_reference = None;
        draft.validate()?;
        self.check_total(method, &draft)?;

        let request = PaymentRequest {
            reference: format!("rcpt_{}", Uuid::new_v4().simple()),
            amount: draft.total_amount,
            currency: self.currency.clone(),
            customer_name: draft.customer.name.clone(),
            customer_mobile: draft.customer.mobile.expose().to_string(),
            user_id: draft.user_id.clone(),
        };

        match adapter.initiate(&request).await? {
            PaymentInitiation::Settled { status } => {
                draft.payment_status = status;
                let order = self.orchestrator.create_order(draft).await?;
                Ok(CheckoutStarted::Placed {
                    order: Box::new(order),
                })
            }
            initiation => {
                info!(
                    reference = %request.reference,
                    method = %method,
                    amount = %request.amount,
                    "Payment initiated"
                );
                self.pending.insert(
                    request.reference.clone(),
                    PendingCheckout {
                        payment: PendingPayment {
                            reference: request.reference,
                            method,
                            amount: draft.total_amount,
                            created_at: Utc::now(),
                        },
                        draft,
                    },
                );
                Ok(CheckoutStarted::AwaitingPayment { initiation })
            }
        }
    }

    /// Finalises a parked checkout. The reference is consumed up front so a
    /// second completion cannot create a second order. It is put back when
    /// the outcome is not final (gateway unreachable, payment still pending,
    /// forged signature) and when a confirmed payment could not be stored.
    pub async fn complete(
        &self,
        reference: &str,
        signal: CompletionSignal,
    ) -> Result<Order, OrderError> {
        let (reference, checkout) = self
            .pending
            .remove(reference)
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))?;

        let adapter = match self.adapter(checkout.payment.method) {
            Ok(adapter) => Arc::clone(adapter),
            Err(e) => {
                self.pending.insert(reference, checkout);
                return Err(e);
            }
        };

        match adapter.complete(&checkout.payment, signal).await {
            Ok(outcome) => {
                let mut draft = checkout.draft.clone();
                draft.payment_status = PaymentStatus::Paid;
                draft.payment_reference = Some(outcome.payment_reference);
                match self.orchestrator.create_order(draft).await {
                    Ok(order) => {
                        info!(reference = %reference, order_id = %order.id, "Paid checkout completed");
                        Ok(order)
                    }
                    Err(e) => {
                        error!(
                            reference = %reference,
                            error = %e,
                            "Payment confirmed but order could not be created, checkout kept"
                        );
                        self.pending.insert(reference, checkout);
                        Err(e)
                    }
                }
            }
            Err(
                e @ (PaymentError::GatewayUnreachable(_)
                | PaymentError::Pending
                | PaymentError::SignatureMismatch),
            ) => {
                warn!(reference = %reference, error = %e, "Payment not final, checkout kept");
                self.pending.insert(reference, checkout);
                Err(e.into())
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "Payment not completed, no order created");
                Err(e.into())
            }
        }
    }

    /// Drops checkouts the customer abandoned. Returns how many were removed.
    pub fn purge_expired(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let before = self.pending.len();
        self.pending
            .retain(|_, checkout| checkout.payment.created_at > cutoff);
        before.saturating_sub(self.pending.len())
    }
}
