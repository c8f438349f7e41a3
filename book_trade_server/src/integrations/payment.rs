use book_trade_engine::{traits::data_objects::RefundReceipt, PaymentGateway, PaymentGatewayError};
use btx_common::Cents;
use log::*;
use paystack_tools::{PaystackApi, PaystackApiError};

/// Implements the engine's [`PaymentGateway`] over the Paystack client.
#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(api: PaystackApi) -> Self {
        Self { api }
    }
}

fn map_error(reference: &str, e: PaystackApiError) -> PaymentGatewayError {
    match e {
        PaystackApiError::Rejected(msg) => PaymentGatewayError::Rejected(msg),
        PaystackApiError::QueryError { status: 404, .. } => {
            PaymentGatewayError::UnknownReference(reference.to_string())
        },
        PaystackApiError::QueryError { status, message } => {
            PaymentGatewayError::Rejected(format!("error {status}: {message}"))
        },
        other => PaymentGatewayError::Unreachable(other.to_string()),
    }
}

impl PaymentGateway for PaystackGateway {
    async fn refund(&self, payment_ref: &str, amount: Cents, reason: &str) -> Result<RefundReceipt, PaymentGatewayError> {
        let data = self.api.refund(payment_ref, amount, reason).await.map_err(|e| map_error(payment_ref, e))?;
        debug!("💸️ Paystack accepted refund {} ({}) against {payment_ref}", data.id, data.status);
        Ok(RefundReceipt { gateway_reference: data.id.to_string() })
    }

    async fn verify(&self, payment_ref: &str) -> Result<bool, PaymentGatewayError> {
        let data = self.api.verify_transaction(payment_ref).await.map_err(|e| map_error(payment_ref, e))?;
        Ok(data.status == "success")
    }
}
