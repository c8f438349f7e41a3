use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{CourierApiError, OrderStoreError, PaymentGatewayError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    /// The requested transition is not in the allowed table. Rejected before any side effect runs.
    #[error("Illegal transition: {0}")]
    InvalidTransition(String),
    /// A compensating action (refund, courier rebook) failed. The transition was aborted and no state was persisted.
    #[error("Compensation step '{step}' failed: {message}")]
    CompensationFailed { step: String, message: String },
    /// The reschedule fee payment could not be confirmed with the gateway.
    #[error("The reschedule fee payment {0} could not be verified")]
    FeeNotVerified(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    /// Another writer changed the order between our read and our write. Safe to retry; the retry will re-read the
    /// current row and usually discover the transition has already happened.
    #[error("The order was modified concurrently. {0}")]
    Conflict(String),
    #[error("Store error: {0}")]
    StoreError(String),
}

impl OrderFlowError {
    pub fn compensation(step: &str, message: impl Into<String>) -> Self {
        Self::CompensationFailed { step: step.to_string(), message: message.into() }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderFlowError::Conflict(_))
    }
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => OrderFlowError::OrderNotFound(id),
            OrderStoreError::StatusConflict { expected, actual } => {
                OrderFlowError::Conflict(format!("expected {expected}, found {actual}"))
            },
            other => OrderFlowError::StoreError(other.to_string()),
        }
    }
}

impl From<PaymentGatewayError> for OrderFlowError {
    fn from(e: PaymentGatewayError) -> Self {
        OrderFlowError::compensation("refund", e.to_string())
    }
}

impl From<CourierApiError> for OrderFlowError {
    fn from(e: CourierApiError) -> Self {
        OrderFlowError::compensation("courier", e.to_string())
    }
}
