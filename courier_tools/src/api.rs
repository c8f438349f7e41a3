use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::CourierConfig,
    data_objects::{BookingResponse, CancelResponse, QuoteResponse, TrackingResponse},
    CourierClientError,
};

#[derive(Clone)]
pub struct CourierClient {
    config: CourierConfig,
    client: Arc<Client>,
}

impl CourierClient {
    pub fn new(config: CourierConfig) -> Result<Self, CourierClientError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| CourierClientError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| CourierClientError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, CourierClientError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| CourierClientError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| CourierClientError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| CourierClientError::RestResponseError(e.to_string()))?;
            Err(CourierClientError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Current tracking state for a parcel.
    pub async fn track_shipment(&self, tracking_reference: &str) -> Result<TrackingResponse, CourierClientError> {
        debug!("Fetching tracking state for {tracking_reference}");
        let result = self
            .rest_query::<TrackingResponse, ()>(
                Method::GET,
                "/tracking",
                &[("tracking_reference", tracking_reference)],
                None,
            )
            .await?;
        debug!("Tracking state for {tracking_reference}: {}", result.status);
        Ok(result)
    }

    /// Cancel a collection booking. `success: false` in the response means the carrier refused (typically because the
    /// driver is already en route).
    pub async fn cancel_collection(
        &self,
        service_level: &str,
        booking_id: &str,
    ) -> Result<CancelResponse, CourierClientError> {
        let path = format!("/collections/{booking_id}/cancel");
        debug!("Cancelling collection booking {booking_id} ({service_level})");
        let result = self
            .rest_query::<CancelResponse, ()>(Method::POST, &path, &[("service_level", service_level)], None)
            .await?;
        info!("Cancellation of booking {booking_id}: success={}", result.success);
        Ok(result)
    }

    /// Rebook a failed collection for a new slot. The aggregator retires the old booking id and issues a new one.
    pub async fn rebook_collection(
        &self,
        service_level: &str,
        booking_id: &str,
        collection_time: DateTime<Utc>,
    ) -> Result<BookingResponse, CourierClientError> {
        let path = format!("/collections/{booking_id}/reschedule");
        let body = serde_json::json!({
            "service_level": service_level,
            "collection_time": collection_time,
        });
        debug!("Rebooking collection {booking_id} ({service_level}) for {collection_time}");
        let result = self.rest_query::<BookingResponse, Value>(Method::POST, &path, &[], Some(body)).await?;
        info!("Collection {booking_id} rebooked as {} for {}", result.booking_id, result.pickup_time);
        Ok(result)
    }

    /// Quote the fee and available slots for rebooking a failed collection.
    pub async fn reschedule_quote(&self, service_level: &str) -> Result<QuoteResponse, CourierClientError> {
        debug!("Fetching reschedule quote for service level {service_level}");
        self.rest_query::<QuoteResponse, ()>(
            Method::GET,
            "/rates/reschedule",
            &[("service_level", service_level)],
            None,
        )
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn urls_are_joined_onto_the_base() {
        let config = CourierConfig::new("https://api.courier.example.com/v2", "ck_test");
        let client = CourierClient::new(config).unwrap();
        assert_eq!(client.url("/tracking"), "https://api.courier.example.com/v2/tracking");
        assert_eq!(
            client.url("/collections/BK-1/cancel"),
            "https://api.courier.example.com/v2/collections/BK-1/cancel"
        );
    }
}
