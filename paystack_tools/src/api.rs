use std::sync::Arc;

use btx_common::{Cents, ZAR_CURRENCY_CODE};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::PaystackConfig,
    data_objects::{ApiResponse, RecipientData, RefundData, TransactionData},
    PaystackApiError,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<ApiResponse<T>, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaystackApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<ApiResponse<T>>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::RestResponseError(e.to_string()))?;
            Err(PaystackApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Refund (part of) a settled charge. `amount` is in ZAR cents; omitting partial amounts is not supported here
    /// because BookTrade only ever refunds in full.
    pub async fn refund(
        &self,
        transaction_reference: &str,
        amount: Cents,
        merchant_note: &str,
    ) -> Result<RefundData, PaystackApiError> {
        let body = serde_json::json!({
            "transaction": transaction_reference,
            "amount": amount,
            "currency": ZAR_CURRENCY_CODE,
            "merchant_note": merchant_note,
        });
        debug!("Requesting refund of {amount} against transaction {transaction_reference}");
        let response = self.rest_query::<RefundData, Value>(Method::POST, "/refund", Some(body)).await?;
        if !response.status {
            return Err(PaystackApiError::Rejected(response.message));
        }
        let data = response.data.ok_or_else(|| PaystackApiError::JsonError("refund response without data".into()))?;
        info!("Refund {} accepted for transaction {transaction_reference} ({})", data.id, data.status);
        Ok(data)
    }

    /// Look up a transaction by reference and report its settlement state.
    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionData, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction {reference}");
        let response = self.rest_query::<TransactionData, ()>(Method::GET, &path, None).await?;
        if !response.status {
            return Err(PaystackApiError::Rejected(response.message));
        }
        response.data.ok_or_else(|| PaystackApiError::JsonError("verify response without data".into()))
    }

    /// Create a transfer recipient for paying a seller out. Returns the `RCP_...` recipient code.
    pub async fn create_transfer_recipient(
        &self,
        name: &str,
        account_number: &str,
        bank_code: &str,
    ) -> Result<RecipientData, PaystackApiError> {
        let body = serde_json::json!({
            "type": "basa",
            "name": name,
            "account_number": account_number,
            "bank_code": bank_code,
            "currency": ZAR_CURRENCY_CODE,
        });
        debug!("Creating transfer recipient for {name}");
        let response = self.rest_query::<RecipientData, Value>(Method::POST, "/transferrecipient", Some(body)).await?;
        if !response.status {
            return Err(PaystackApiError::Rejected(response.message));
        }
        let data =
            response.data.ok_or_else(|| PaystackApiError::JsonError("recipient response without data".into()))?;
        info!("Transfer recipient {} created for {name}", data.recipient_code);
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn urls_are_joined_onto_the_base() {
        let config = PaystackConfig::new("https://api.paystack.co", "sk_test_abc");
        let api = PaystackApi::new(config).unwrap();
        assert_eq!(api.url("/refund"), "https://api.paystack.co/refund");
        assert_eq!(api.url("/transaction/verify/FEE-1"), "https://api.paystack.co/transaction/verify/FEE-1");
    }
}
