use btx_common::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scan/checkpoint in a parcel's history, as the aggregator reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelEvent {
    pub status: String,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Response to a tracking query. `status` carries the aggregator's own vocabulary (`IN_TRANSIT`,
/// `COLLECTION_FAILED`, ...); mapping it onto BookTrade's delivery states is the engine's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub tracking_reference: String,
    pub status: String,
    #[serde(default)]
    pub status_description: String,
    #[serde(default)]
    pub events: Vec<ParcelEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Returned by a (re)booking call. The aggregator issues a fresh booking id on every rebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_id: String,
    pub pickup_time: DateTime<Utc>,
}

/// A quote for rebooking a failed collection: the fee and the slots the carrier can offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub quote_id: String,
    pub service_level: String,
    pub fee_cents: Cents,
    pub available_times: Vec<DateTime<Utc>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tracking_response_tolerates_sparse_payloads() {
        let json = r#"{
            "tracking_reference": "TRK-1001",
            "status": "COLLECTION_FAILED",
            "events": [
                {"status": "COLLECTION_FAILED", "timestamp": "2024-05-13T08:30:00Z"}
            ]
        }"#;
        let parsed: TrackingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, "COLLECTION_FAILED");
        assert!(parsed.status_description.is_empty());
        assert_eq!(parsed.events.len(), 1);
        assert!(parsed.events[0].location.is_none());
    }

    #[test]
    fn quote_response_parses_fee_in_cents() {
        let json = r#"{
            "quote_id": "Q-77",
            "service_level": "ECO",
            "fee_cents": 5000,
            "available_times": ["2024-05-14T09:00:00Z", "2024-05-15T09:00:00Z"]
        }"#;
        let parsed: QuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.fee_cents, Cents::from(5_000));
        assert_eq!(parsed.available_times.len(), 2);
    }
}
