use book_trade_engine::{PayoutProvisioner, PayoutProvisionerError};
use log::*;
use paystack_tools::PaystackApi;

use crate::integrations::PlatformClient;

/// Implements the engine's [`PayoutProvisioner`]: looks the seller's banking details up on the platform API, then
/// registers them with Paystack as a transfer recipient.
#[derive(Clone)]
pub struct PaystackPayout {
    api: PaystackApi,
    platform: PlatformClient,
}

impl PaystackPayout {
    pub fn new(api: PaystackApi, platform: PlatformClient) -> Self {
        Self { api, platform }
    }
}

impl PayoutProvisioner for PaystackPayout {
    async fn create_recipient(&self, seller_id: &str) -> Result<String, PayoutProvisionerError> {
        let banking = self.platform.banking_details(seller_id).await.map_err(|e| {
            PayoutProvisionerError::ProvisioningFailed { seller_id: seller_id.to_string(), message: e.to_string() }
        })?;
        let recipient = self
            .api
            .create_transfer_recipient(&banking.account_name, &banking.account_number, &banking.bank_code)
            .await
            .map_err(|e| PayoutProvisionerError::ProvisioningFailed {
                seller_id: seller_id.to_string(),
                message: e.to_string(),
            })?;
        info!("💰️ Seller {seller_id} provisioned as transfer recipient {}", recipient.recipient_code);
        Ok(recipient.recipient_code)
    }
}
