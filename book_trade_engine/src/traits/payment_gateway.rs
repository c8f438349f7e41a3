use btx_common::Cents;
use thiserror::Error;

use crate::traits::data_objects::RefundReceipt;

/// The payment gateway, reduced to the two calls the lifecycle engine needs.
///
/// `refund` is a financial mutation and is never retried automatically. A failure surfaces to the caller, who decides
/// whether to retry explicitly. `verify` is a read and may be retried by callers.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Issue a refund against the original payment. Returns the gateway's refund reference on success.
    async fn refund(&self, payment_ref: &str, amount: Cents, reason: &str) -> Result<RefundReceipt, PaymentGatewayError>;

    /// Check that a payment with the given reference was captured successfully. Used to confirm reschedule-fee
    /// payments made out-of-band.
    async fn verify(&self, payment_ref: &str) -> Result<bool, PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("The payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Could not reach the payment gateway: {0}")]
    Unreachable(String),
    #[error("The payment reference {0} is unknown to the gateway")]
    UnknownReference(String),
}
