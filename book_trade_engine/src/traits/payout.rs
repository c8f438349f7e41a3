use thiserror::Error;

/// Payout-recipient provisioning, invoked once a delivery reaches its terminal state.
///
/// Registers the seller's banking details with the gateway so funds can be transferred. A failure here is recorded
/// alongside the tracking update result, but never fails the tracking update itself.
#[allow(async_fn_in_trait)]
pub trait PayoutProvisioner: Clone {
    async fn create_recipient(&self, seller_id: &str) -> Result<String, PayoutProvisionerError>;
}

#[derive(Debug, Clone, Error)]
pub enum PayoutProvisionerError {
    #[error("Could not provision payout recipient for seller {seller_id}: {message}")]
    ProvisioningFailed { seller_id: String, message: String },
}
