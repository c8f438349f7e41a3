use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::PlatformConfig;

/// Client for the marketplace platform API. The lifecycle server is not the system of record for users; in-app
/// notification rows, transactional mail and seller banking details all live behind this internal service.
#[derive(Clone)]
pub struct PlatformClient {
    config: PlatformConfig,
    client: Arc<Client>,
}

#[derive(Debug, Error)]
pub enum PlatformApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingDetails {
    pub account_name: String,
    pub account_number: String,
    pub bank_code: String,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.api_key.reveal())
            .map_err(|e| PlatformApiError::Initialization(e.to_string()))?;
        headers.insert("x-api-key", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PlatformApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PlatformApiError> {
        let url = format!("{}{path}", self.config.api_url);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PlatformApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| PlatformApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PlatformApiError::RestResponseError(e.to_string()))?;
            Err(PlatformApiError::QueryError { status, message })
        }
    }

    /// Record an in-app notification for a user.
    pub async fn record_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: &str,
    ) -> Result<(), PlatformApiError> {
        let body = serde_json::json!({
            "user_id": user_id,
            "title": title,
            "message": message,
            "kind": kind,
        });
        self.rest_query::<Value, Value>(Method::POST, "/notifications", Some(body)).await?;
        Ok(())
    }

    /// Send a transactional email through the platform's mail provider.
    pub async fn send_email(
        &self,
        address: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), PlatformApiError> {
        let body = serde_json::json!({
            "to": address,
            "subject": subject,
            "html": html_body,
            "text": text_body,
        });
        self.rest_query::<Value, Value>(Method::POST, "/mail/send", Some(body)).await?;
        Ok(())
    }

    /// The banking details a seller registered for payouts.
    pub async fn banking_details(&self, seller_id: &str) -> Result<BankingDetails, PlatformApiError> {
        let path = format!("/sellers/{seller_id}/banking");
        self.rest_query::<BankingDetails, ()>(Method::GET, &path, None).await
    }
}
