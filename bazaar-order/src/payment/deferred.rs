use async_trait::async_trait;
use bazaar_core::payment::{
    CompletionSignal, PaymentInitiation, PaymentOutcome, PaymentRequest, PendingPayment,
};
use bazaar_core::{PaymentAdapter, PaymentError, PaymentMethod, PaymentStatus};

/// Cash on delivery: nothing to collect up front, the order is placed as
/// `pending` and settled later.
pub struct DeferredSettlement;

#[async_trait]
impl PaymentAdapter for DeferredSettlement {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Cod
    }

    async fn initiate(&self, _request: &PaymentRequest) -> Result<PaymentInitiation, PaymentError> {
        Ok(PaymentInitiation::Settled {
            status: PaymentStatus::Pending,
        })
    }

    async fn complete(
        &self,
        _pending: &PendingPayment,
        _signal: CompletionSignal,
    ) -> Result<PaymentOutcome, PaymentError> {
        Err(PaymentError::NotApplicable(PaymentMethod::Cod))
    }
}
